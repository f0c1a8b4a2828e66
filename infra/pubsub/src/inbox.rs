use crate::error::PubSubError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default inbox buffer: one value in flight between a publisher and the dispatcher.
pub const DEFAULT_INBOX_CAPACITY: usize = 1;
const MIN_CAPACITY: usize = 1;

/// The inbound channel a subscriber hands to the dispatcher.
///
/// The capacity is the subscriber's choice and bounds how many published values can
/// queue before [`PubSub::publish`](crate::PubSub::publish) starts waiting. The
/// receiving half can be taken exactly once.
#[derive(Debug)]
pub struct Inbox<T> {
    sender: mpsc::Sender<Arc<T>>,
    receiver: Mutex<Option<mpsc::Receiver<Arc<T>>>>,
    capacity: usize,
}

impl<T> Inbox<T> {
    /// Creates an inbox with [`DEFAULT_INBOX_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::build(DEFAULT_INBOX_CAPACITY)
    }

    /// Creates an inbox buffering up to `capacity` values.
    ///
    /// # Errors
    /// Returns [`PubSubError::InvalidCapacity`] if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Result<Self, PubSubError> {
        if capacity < MIN_CAPACITY {
            return Err(PubSubError::InvalidCapacity {
                message: format!("inbox capacity must be >= {MIN_CAPACITY}").into(),
                context: None,
            });
        }
        Ok(Self::build(capacity))
    }

    fn build(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self { sender, receiver: Mutex::new(Some(receiver)), capacity }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the receiving half is still available for registration.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.receiver.lock().is_some()
    }

    /// Whether the channel has been closed by its dispatcher.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<Arc<T>> {
        self.sender.clone()
    }

    pub(crate) fn take_receiver(&self) -> Option<mpsc::Receiver<Arc<T>>> {
        self.receiver.lock().take()
    }
}

impl<T> Default for Inbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        let result = Inbox::<u8>::with_capacity(0);
        assert!(matches!(result, Err(PubSubError::InvalidCapacity { .. })));
    }

    #[test]
    fn test_receiver_taken_once() {
        let inbox = Inbox::<u8>::new();
        assert_eq!(inbox.capacity(), DEFAULT_INBOX_CAPACITY);
        assert!(inbox.is_available());

        assert!(inbox.take_receiver().is_some());
        assert!(!inbox.is_available());
        assert!(inbox.take_receiver().is_none());
    }

    #[test]
    fn test_closing_receiver_closes_inbox() {
        let inbox = Inbox::<u8>::with_capacity(4).unwrap();
        let mut rx = inbox.take_receiver().unwrap();
        assert!(!inbox.is_closed());

        rx.close();
        assert!(inbox.is_closed());
    }
}
