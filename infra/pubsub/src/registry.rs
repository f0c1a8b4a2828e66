use crate::topic::Topic;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Concurrency-safe map from [`Topic`] to the ordered bindings registered under it.
///
/// A topic key exists iff at least one binding is stored for it. Lookups take the
/// read lock, so concurrent publishers never serialize against each other.
#[derive(Debug)]
pub struct Registry<B> {
    entries: RwLock<FxHashMap<Topic, Vec<Arc<B>>>>,
}

impl<B> Registry<B> {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: RwLock::new(FxHashMap::default()) }
    }

    /// Snapshot of the bindings registered under `topic`.
    #[must_use]
    pub fn load(&self, topic: &Topic) -> Option<Vec<Arc<B>>> {
        self.entries.read().get(topic).cloned()
    }

    /// Appends `bindings` to the list for `topic`, creating it if absent.
    pub fn add(&self, topic: Topic, bindings: impl IntoIterator<Item = Arc<B>>) {
        let mut bindings = bindings.into_iter().peekable();
        if bindings.peek().is_none() {
            return;
        }
        self.entries.write().entry(topic).or_default().extend(bindings);
    }

    /// Removes `topic` and hands back the bindings that were stored under it.
    pub fn delete(&self, topic: &Topic) -> Option<Vec<Arc<B>>> {
        self.entries.write().remove(topic)
    }

    /// Number of distinct topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    #[must_use]
    pub fn contains(&self, topic: &Topic) -> bool {
        self.entries.read().contains_key(topic)
    }

    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        self.entries.read().keys().cloned().collect()
    }
}

impl<B> Default for Registry<B> {
    fn default() -> Self {
        Self::new()
    }
}
