use crate::inbox::Inbox;
use crate::topic::Topic;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Marker trait for values that can be published through a [`PubSub`](crate::PubSub).
///
/// Any type that is `Send + Sync + 'static` automatically implements this trait.
pub trait Event: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> Event for T {}

/// A consumer of values published under one [`Topic`].
///
/// The dispatcher calls [`Subscriber::handle`] on a fresh task for every value that
/// arrives in the subscriber's [`Inbox`]. The token passed in is the cancellation
/// context given at registration.
///
/// # Examples
/// ```rust
/// use fanout_pubsub::{Inbox, Subscriber, Topic};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// struct AuditLog {
///     inbox: Inbox<String>,
/// }
///
/// impl Subscriber<String> for AuditLog {
///     fn topic(&self) -> Topic {
///         Topic::new("audit")
///     }
///
///     fn inbox(&self) -> &Inbox<String> {
///         &self.inbox
///     }
///
///     async fn handle(&self, _ctx: CancellationToken, line: Arc<String>) -> anyhow::Result<()> {
///         anyhow::ensure!(!line.is_empty(), "empty audit line");
///         Ok(())
///     }
/// }
/// ```
pub trait Subscriber<T: Event>: Send + Sync + 'static {
    fn topic(&self) -> Topic;

    fn inbox(&self) -> &Inbox<T>;

    /// Processes one value. A returned error is logged and the value is dropped.
    fn handle(
        &self,
        ctx: CancellationToken,
        value: Arc<T>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

impl<T: Event, S: Subscriber<T>> Subscriber<T> for Arc<S> {
    fn topic(&self) -> Topic {
        (**self).topic()
    }

    fn inbox(&self) -> &Inbox<T> {
        (**self).inbox()
    }

    fn handle(
        &self,
        ctx: CancellationToken,
        value: Arc<T>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        (**self).handle(ctx, value)
    }
}

/// Closure-backed [`Subscriber`].
///
/// The closure creates a new future per value; shared state has to live behind an
/// `Arc` captured by the closure.
///
/// # Examples
/// ```rust
/// use fanout_pubsub::{Inbox, SubscriberFn};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// let sub = SubscriberFn::new("metrics", Inbox::<u64>::new(), |_ctx: CancellationToken, v: Arc<u64>| async move {
///     anyhow::ensure!(*v < 1_000, "value out of range");
///     Ok(())
/// });
/// assert_eq!(sub.topic_name(), "metrics");
/// ```
pub struct SubscriberFn<T, F> {
    topic: Topic,
    inbox: Inbox<T>,
    f: F,
}

impl<T, F> SubscriberFn<T, F> {
    pub fn new(topic: impl Into<Topic>, inbox: Inbox<T>, f: F) -> Self {
        Self { topic: topic.into(), inbox, f }
    }

    #[must_use]
    pub fn topic_name(&self) -> &str {
        self.topic.as_str()
    }
}

impl<T, F> fmt::Debug for SubscriberFn<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberFn")
            .field("topic", &self.topic)
            .field("inbox_capacity", &self.inbox.capacity())
            .finish_non_exhaustive()
    }
}

impl<T, F, Fut> Subscriber<T> for SubscriberFn<T, F>
where
    T: Event,
    F: Fn(CancellationToken, Arc<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    fn topic(&self) -> Topic {
        self.topic.clone()
    }

    fn inbox(&self) -> &Inbox<T> {
        &self.inbox
    }

    fn handle(
        &self,
        ctx: CancellationToken,
        value: Arc<T>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        (self.f)(ctx, value)
    }
}
