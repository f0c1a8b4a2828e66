use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Concurrency limit value that disables the gate.
pub const CONCURRENCY_UNLIMITED: usize = 0;

/// Counting permit pool bounding simultaneous invocations of one subscriber.
///
/// A gate built with [`CONCURRENCY_UNLIMITED`] is disabled: [`Gate::acquire`] returns
/// immediately with an empty [`Permit`]. Capacity `1` still serializes.
#[derive(Debug, Clone)]
pub struct Gate {
    semaphore: Option<Arc<Semaphore>>,
    capacity: usize,
}

impl Gate {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let semaphore = match capacity {
            CONCURRENCY_UNLIMITED => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        Self { semaphore, capacity }
    }

    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(CONCURRENCY_UNLIMITED)
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.semaphore.is_some()
    }

    /// Configured capacity; `0` when the gate is disabled.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free, or `None` when the gate is disabled.
    #[must_use]
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    /// Waits for a permit. The permit is returned to the pool when dropped.
    pub async fn acquire(&self) -> Permit {
        match &self.semaphore {
            Some(sem) => Permit(sem.clone().acquire_owned().await.ok()),
            None => Permit(None),
        }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// A held slot of a [`Gate`]. Dropping it releases the slot.
#[must_use = "dropping the permit releases it immediately"]
#[derive(Debug)]
pub struct Permit(Option<OwnedSemaphorePermit>);

impl Permit {
    /// Releases the slot. Equivalent to dropping the permit.
    pub fn release(self) {
        drop(self);
    }
}
