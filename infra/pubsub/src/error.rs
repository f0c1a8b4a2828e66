use std::borrow::Cow;

/// Errors surfaced by the fallible (`try_*`) forms of the [`PubSub`](crate::PubSub) API.
///
/// The infallible forms log these at error level instead of returning them.
#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    /// No binding is registered under the requested topic.
    #[error("Topic not found{}: {message}", format_context(.context))]
    TopicNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The receiving half of an inbox was already handed to a dispatcher.
    #[error("Inbox already taken{}: {message}", format_context(.context))]
    InboxTaken { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Inbox capacity must be greater than zero.
    #[error("Invalid capacity{}: {message}", format_context(.context))]
    InvalidCapacity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Attaches a human-readable context to a [`PubSubError`] result.
pub trait PubSubErrorExt<T> {
    /// Replaces the context of the contained error, if any.
    ///
    /// # Errors
    /// Returns the original error with the new context attached.
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, PubSubError>;
}

impl<T> PubSubErrorExt<T> for Result<T, PubSubError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                PubSubError::TopicNotFound { context: c, .. }
                | PubSubError::InboxTaken { context: c, .. }
                | PubSubError::InvalidCapacity { context: c, .. } => *c = Some(context.into()),
            }
            e
        })
    }
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_context() {
        let err = PubSubError::TopicNotFound { message: "orders".into(), context: None };
        assert_eq!(err.to_string(), "Topic not found: orders");
    }

    #[test]
    fn test_context_is_attached() {
        let res: Result<(), PubSubError> =
            Err(PubSubError::InboxTaken { message: "orders".into(), context: None });
        let err = res.context("second registration").unwrap_err();
        assert_eq!(err.to_string(), "Inbox already taken (second registration): orders");
    }
}
