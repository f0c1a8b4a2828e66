use crate::gate::CONCURRENCY_UNLIMITED;
use serde::Deserialize;

/// Per-registration settings applied to every subscriber in one `register` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubscribeOptions {
    /// Upper bound on simultaneous invocations of the processing function.
    /// [`CONCURRENCY_UNLIMITED`] (the default) disables the limit.
    pub max_concurrency: usize,
}

impl SubscribeOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self { max_concurrency: CONCURRENCY_UNLIMITED }
    }

    #[must_use = "Options must be passed to a register call to take effect"]
    pub const fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unlimited() {
        assert_eq!(SubscribeOptions::default().max_concurrency, CONCURRENCY_UNLIMITED);
        assert_eq!(SubscribeOptions::new().with_max_concurrency(3).max_concurrency, 3);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let opts: SubscribeOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, SubscribeOptions::default());

        let opts: SubscribeOptions = serde_json::from_str(r#"{"max_concurrency": 4}"#).unwrap();
        assert_eq!(opts.max_concurrency, 4);

        let unknown = serde_json::from_str::<SubscribeOptions>(r#"{"max_concurency": 4}"#);
        assert!(unknown.is_err(), "misspelled keys must be rejected");
    }
}
