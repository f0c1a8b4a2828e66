use crate::binding::Binding;
use crate::error::PubSubError;
use crate::options::SubscribeOptions;
use crate::registry::Registry;
use crate::subscriber::{Event, Subscriber};
use crate::topic::Topic;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, trace};

/// The publishing capability of a [`PubSub`], for producers that should not see
/// registration or shutdown.
pub trait Publisher<T: Event>: Send + Sync {
    /// Delivers `value` to every subscriber of `topic`. See [`PubSub::publish`].
    fn publish(&self, topic: &Topic, value: T) -> impl Future<Output = ()> + Send;
}

/// In-process topic dispatcher.
///
/// Every registered subscriber gets its own binding: a dispatcher loop reading the
/// subscriber's [`Inbox`](crate::Inbox) and spawning one task per value, limited by the
/// binding's concurrency gate. Cloning is cheap and clones share all state.
///
/// # Backpressure
/// [`PubSub::publish`] waits until every bound inbox has accepted the value. A
/// subscriber that stops draining its inbox therefore blocks publishers of its topic
/// indefinitely, and delays delivery to subscribers registered after it.
///
/// # Examples
/// ```rust
/// use fanout_pubsub::{Inbox, PubSub, SubscribeOptions, SubscriberFn, Topic};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() {
/// let pubsub = PubSub::<String>::new();
/// let seen = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&seen);
/// let sub = SubscriberFn::new("greetings", Inbox::new(), move |_ctx: CancellationToken, _v: Arc<String>| {
///     let counter = Arc::clone(&counter);
///     async move {
///         counter.fetch_add(1, Ordering::SeqCst);
///         Ok::<_, anyhow::Error>(())
///     }
/// });
///
/// let ctx = CancellationToken::new();
/// pubsub.register(&ctx, sub, SubscribeOptions::default());
/// pubsub.publish(&Topic::new("greetings"), "hello".to_owned()).await;
///
/// pubsub.stop_all().await;
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// # }
/// ```
pub struct PubSub<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    registry: Registry<Binding<T>>,
    dispatchers: TaskTracker,
}

impl<T: Event> PubSub<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner { registry: Registry::new(), dispatchers: TaskTracker::new() }),
        }
    }

    /// Registers `subscriber` and starts its dispatcher loop.
    ///
    /// Several subscribers may share a topic; each gets an independent binding. A
    /// rejected registration is logged at error level.
    ///
    /// `ctx` is the abrupt stop path: cancelling it makes the dispatcher exit without
    /// draining its inbox or waiting for in-flight invocations.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register<S: Subscriber<T>>(
        &self,
        ctx: &CancellationToken,
        subscriber: S,
        opts: SubscribeOptions,
    ) {
        if let Err(err) = self.try_register(ctx, subscriber, opts) {
            error!("Subscriber registration rejected: {err}");
        }
    }

    /// Registers every subscriber in `subscribers` with the same options.
    pub fn register_all<S, I>(&self, ctx: &CancellationToken, subscribers: I, opts: SubscribeOptions)
    where
        S: Subscriber<T>,
        I: IntoIterator<Item = S>,
    {
        for subscriber in subscribers {
            self.register(ctx, subscriber, opts);
        }
    }

    /// Like [`PubSub::register`], but returns the rejection instead of logging it.
    ///
    /// # Errors
    /// Returns [`PubSubError::InboxTaken`] if the subscriber's inbox is already bound.
    pub fn try_register<S: Subscriber<T>>(
        &self,
        ctx: &CancellationToken,
        subscriber: S,
        opts: SubscribeOptions,
    ) -> Result<(), PubSubError> {
        let subscriber = Arc::new(subscriber);
        let topic = subscriber.topic();
        let binding = Binding::start(subscriber, ctx.clone(), opts, &self.inner.dispatchers)?;

        debug!(
            topic = %topic,
            binding = binding.id(),
            max_concurrency = binding.gate().capacity(),
            "Subscriber registered"
        );
        self.inner.registry.add(topic, [binding]);
        Ok(())
    }

    /// Delivers `value` to every subscriber of `topic`, in registration order.
    ///
    /// Returns immediately when nobody subscribes to `topic`. Otherwise waits for
    /// each inbox to accept the value; see the type-level note on backpressure.
    pub async fn publish(&self, topic: &Topic, value: T) {
        self.publish_arc(topic, Arc::new(value)).await;
    }

    /// Publishes a shared value without re-wrapping.
    pub async fn publish_arc(&self, topic: &Topic, value: Arc<T>) {
        let Some(bindings) = self.inner.registry.load(topic) else {
            trace!(topic = %topic, "Value dropped: no subscribers");
            return;
        };

        let mut delivered = 0_usize;
        for binding in &bindings {
            if binding.deliver(Arc::clone(&value)).await {
                delivered += 1;
            }
        }
        trace!(topic = %topic, delivered, bindings = bindings.len(), "Value dispatched");
    }

    /// Gracefully removes every subscriber of `topic`.
    ///
    /// New publishes to `topic` are dropped as soon as this starts. Returns after every
    /// dispatcher of the topic has exited and all in-flight invocations have finished.
    /// An unknown topic is logged at error level.
    pub async fn deregister_topic(&self, topic: &Topic) {
        if let Err(err) = self.try_deregister_topic(topic).await {
            error!("Topic deregistration failed: {err}");
        }
    }

    /// Like [`PubSub::deregister_topic`], returning the number of stopped subscribers.
    ///
    /// # Errors
    /// Returns [`PubSubError::TopicNotFound`] if nothing is registered under `topic`.
    pub async fn try_deregister_topic(&self, topic: &Topic) -> Result<usize, PubSubError> {
        let bindings =
            self.inner.registry.delete(topic).ok_or_else(|| PubSubError::TopicNotFound {
                message: format!("no subscriber with name '{topic}'").into(),
                context: None,
            })?;

        for binding in &bindings {
            binding.stop().await;
        }
        debug!(topic = %topic, bindings = bindings.len(), "Topic deregistered");
        Ok(bindings.len())
    }

    /// Gracefully stops every topic concurrently, then waits for every dispatcher
    /// loop in the system to exit.
    ///
    /// Topics registered while the shutdown runs, e.g. by a handler that is still
    /// draining, are stopped as well. Registrations from other tasks racing with the
    /// final wait are not supported: their dispatchers keep this call waiting until
    /// their topic is deregistered.
    ///
    /// Idempotent. The instance stays usable: subscribers may be registered again
    /// afterwards.
    pub async fn stop_all(&self) {
        loop {
            let topics = self.inner.registry.topics();
            if topics.is_empty() {
                break;
            }

            let mut tasks = JoinSet::new();
            for topic in topics {
                let pubsub = self.clone();
                tasks.spawn(async move {
                    match pubsub.try_deregister_topic(&topic).await {
                        Ok(_) => {},
                        Err(PubSubError::TopicNotFound { .. }) => {
                            debug!(topic = %topic, "Topic already deregistered");
                        },
                        Err(err) => error!(topic = %topic, "Topic shutdown failed: {err}"),
                    }
                });
            }

            while let Some(joined) = tasks.join_next().await {
                if let Err(err) = joined {
                    error!("Topic shutdown task failed: {err}");
                }
            }
        }

        self.inner.dispatchers.close();
        self.inner.dispatchers.wait().await;
        self.inner.dispatchers.reopen();
        debug!("All subscribers stopped");
    }

    /// Number of distinct topics with at least one subscriber.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Number of subscribers bound to `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.inner.registry.load(topic).map_or(0, |bindings| bindings.len())
    }

    #[must_use]
    pub fn contains_topic(&self, topic: &Topic) -> bool {
        self.inner.registry.contains(topic)
    }

    /// Number of dispatcher loops still running.
    #[must_use]
    pub fn running_dispatchers(&self) -> usize {
        self.inner.dispatchers.len()
    }
}

impl<T: Event> Default for PubSub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for PubSub<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> fmt::Debug for PubSub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubSub")
            .field("registry", &self.inner.registry)
            .field("dispatchers", &self.inner.dispatchers.len())
            .finish()
    }
}

impl<T: Event> Publisher<T> for PubSub<T> {
    fn publish(&self, topic: &Topic, value: T) -> impl Future<Output = ()> + Send {
        Self::publish(self, topic, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::Inbox;
    use crate::subscriber::SubscriberFn;
    use std::time::Duration;

    fn noop(topic: &str) -> impl Subscriber<u32> {
        SubscriberFn::new(topic, Inbox::new(), |_ctx: CancellationToken, _v: Arc<u32>| async {
            Ok::<_, anyhow::Error>(())
        })
    }

    #[tokio::test]
    async fn test_register_adds_binding() {
        let pubsub = PubSub::new();
        let ctx = CancellationToken::new();

        pubsub.register(&ctx, noop("a"), SubscribeOptions::default());
        assert_eq!(pubsub.subscriber_count(&Topic::new("a")), 1);
        assert_eq!(pubsub.running_dispatchers(), 1);

        pubsub.register(&ctx, noop("a"), SubscribeOptions::default());
        assert_eq!(pubsub.subscriber_count(&Topic::new("a")), 2);
        assert_eq!(pubsub.topic_count(), 1);

        pubsub.stop_all().await;
        assert_eq!(pubsub.topic_count(), 0);
        assert_eq!(pubsub.running_dispatchers(), 0);
    }

    #[tokio::test]
    async fn test_same_inbox_rejected() {
        let pubsub = PubSub::new();
        let ctx = CancellationToken::new();
        let shared = Arc::new(noop("shared"));

        pubsub.try_register(&ctx, Arc::clone(&shared), SubscribeOptions::default()).unwrap();
        let second = pubsub.try_register(&ctx, shared, SubscribeOptions::default());

        assert!(matches!(second, Err(PubSubError::InboxTaken { .. })));
        assert_eq!(pubsub.subscriber_count(&Topic::new("shared")), 1);
        pubsub.stop_all().await;
    }

    #[tokio::test]
    async fn test_unknown_topic_is_not_found() {
        let pubsub = PubSub::<u32>::new();
        let res = pubsub.try_deregister_topic(&Topic::new("never")).await;
        assert!(matches!(res, Err(PubSubError::TopicNotFound { .. })));

        // The logging form must not panic either.
        pubsub.deregister_topic(&Topic::new("never")).await;
    }

    #[tokio::test]
    async fn test_debug_lists_bindings() {
        let pubsub = PubSub::new();
        pubsub.register(&CancellationToken::new(), noop("dbg"), SubscribeOptions::default());

        let rendered = format!("{pubsub:?}");
        assert!(rendered.contains("dbg"), "debug output should mention the topic: {rendered}");
        pubsub.stop_all().await;
    }

    #[tokio::test]
    async fn test_stop_all_stops_topics_registered_while_draining() {
        let pubsub = PubSub::<u32>::new();
        let ctx = CancellationToken::new();

        let spawner = pubsub.clone();
        let spawn_ctx = ctx.clone();
        let parent = SubscriberFn::new("parent", Inbox::new(), move |_ctx: CancellationToken, _v: Arc<u32>| {
            let pubsub = spawner.clone();
            let ctx = spawn_ctx.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                pubsub.register(&ctx, noop("child"), SubscribeOptions::default());
                Ok::<_, anyhow::Error>(())
            }
        });
        pubsub.register(&ctx, parent, SubscribeOptions::default());
        pubsub.publish(&Topic::new("parent"), 1).await;

        let stopped = tokio::time::timeout(Duration::from_secs(5), pubsub.stop_all()).await;
        assert!(stopped.is_ok(), "stop_all must not wait on a late registration");
        assert_eq!(pubsub.topic_count(), 0);
        assert_eq!(pubsub.running_dispatchers(), 0);
    }
}
