use crate::error::PubSubError;
use crate::gate::{Gate, Permit};
use crate::options::SubscribeOptions;
use crate::subscriber::{Event, Subscriber};
use crate::topic::Topic;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, trace};

static NEXT_BINDING_ID: AtomicU64 = AtomicU64::new(1);

type Receiver<T> = mpsc::Receiver<Arc<T>>;

/// Live runtime state of one registered subscriber.
///
/// The receiving half of the inbox belongs to the dispatcher loop while it runs and
/// comes back through the dispatcher's join handle. Values the inbox accepted are
/// dispatched before a graceful stop returns; external cancellation drops them.
pub(crate) struct Binding<T> {
    id: u64,
    topic: Topic,
    sender: mpsc::Sender<Arc<T>>,
    shutdown: CancellationToken,
    in_flight: TaskTracker,
    gate: Gate,
    dispatcher: Mutex<Option<JoinHandle<Receiver<T>>>>,
}

impl<T: Event> Binding<T> {
    /// Takes the subscriber's inbox and starts its dispatcher loop on `dispatchers`.
    pub(crate) fn start<S: Subscriber<T>>(
        subscriber: Arc<S>,
        ctx: CancellationToken,
        opts: SubscribeOptions,
        dispatchers: &TaskTracker,
    ) -> Result<Arc<Self>, PubSubError> {
        let topic = subscriber.topic();
        let inbox = subscriber.inbox();
        let receiver = inbox.take_receiver().ok_or_else(|| PubSubError::InboxTaken {
            message: topic.to_string().into(),
            context: Some("inbox is already bound to a dispatcher".into()),
        })?;
        let sender = inbox.sender();

        let id = NEXT_BINDING_ID.fetch_add(1, Ordering::Relaxed);
        let shutdown = CancellationToken::new();
        let in_flight = TaskTracker::new();
        let gate = Gate::new(opts.max_concurrency);

        let dispatcher = Dispatcher {
            id,
            topic: topic.clone(),
            subscriber,
            ctx,
            shutdown: shutdown.clone(),
            in_flight: in_flight.clone(),
            gate: gate.clone(),
            _event: PhantomData,
        };
        let handle = dispatchers.spawn(dispatcher.run(receiver));

        Ok(Arc::new(Self {
            id,
            topic,
            sender,
            shutdown,
            in_flight,
            gate,
            dispatcher: Mutex::new(Some(handle)),
        }))
    }

    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    pub(crate) const fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Sends `value` into the inbox, waiting for capacity.
    ///
    /// Returns `false` when the inbox was closed before the value was accepted.
    pub(crate) async fn deliver(&self, value: Arc<T>) -> bool {
        if self.sender.send(value).await.is_err() {
            debug!(topic = %self.topic, binding = self.id, "Value dropped: inbox closed");
            return false;
        }
        true
    }

    /// Graceful stop: signal the dispatcher, which closes the inbox and dispatches every
    /// value it already accepted, then wait for it and for every in-flight invocation.
    pub(crate) async fn stop(&self) {
        self.shutdown.cancel();

        let handle = self.dispatcher.lock().take();
        let receiver = match handle {
            Some(handle) => match handle.await {
                Ok(receiver) => Some(receiver),
                Err(err) => {
                    error!(topic = %self.topic, binding = self.id, "Dispatcher terminated abnormally: {err}");
                    None
                },
            },
            None => None,
        };

        self.in_flight.close();
        self.in_flight.wait().await;

        if let Some(mut receiver) = receiver {
            receiver.close();
        }
        trace!(topic = %self.topic, binding = self.id, "Binding stopped");
    }
}

impl<T> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("gate", &self.gate)
            .field("in_flight", &self.in_flight.len())
            .field("stopped", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

struct Dispatcher<T, S> {
    id: u64,
    topic: Topic,
    subscriber: Arc<S>,
    ctx: CancellationToken,
    shutdown: CancellationToken,
    in_flight: TaskTracker,
    gate: Gate,
    _event: PhantomData<fn(Arc<T>)>,
}

impl<T: Event, S: Subscriber<T>> Dispatcher<T, S> {
    async fn run(self, mut receiver: Receiver<T>) -> Receiver<T> {
        trace!(topic = %self.topic, binding = self.id, "Dispatcher started");

        loop {
            let value = tokio::select! {
                biased;
                () = self.ctx.cancelled() => {
                    receiver.close();
                    debug!(topic = %self.topic, binding = self.id, "Dispatcher cancelled by context");
                    break;
                },
                () = self.shutdown.cancelled() => {
                    self.drain(&mut receiver).await;
                    break;
                },
                value = receiver.recv() => match value {
                    Some(value) => value,
                    None => {
                        debug!(topic = %self.topic, binding = self.id, "Inbox closed");
                        break;
                    },
                },
            };

            if !self.dispatch(value).await {
                receiver.close();
                break;
            }
        }

        trace!(topic = %self.topic, binding = self.id, "Dispatcher stopped");
        receiver
    }

    /// Waits for a permit and spawns the invocation for `value`.
    ///
    /// Only external cancellation abandons a received value; returns `false` when it does.
    async fn dispatch(&self, value: Arc<T>) -> bool {
        let permit = tokio::select! {
            biased;
            () = self.ctx.cancelled() => {
                debug!(
                    topic = %self.topic,
                    binding = self.id,
                    "Dispatcher cancelled while waiting for a permit; value dropped"
                );
                return false;
            },
            permit = self.gate.acquire() => permit,
        };

        self.invoke(value, permit);
        true
    }

    /// Graceful exit: stop accepting values, then dispatch everything already buffered.
    async fn drain(&self, receiver: &mut Receiver<T>) {
        receiver.close();

        let mut drained = 0_usize;
        while let Some(value) = receiver.recv().await {
            if !self.dispatch(value).await {
                return;
            }
            drained += 1;
        }
        debug!(topic = %self.topic, binding = self.id, drained, "Dispatcher shut down");
    }

    fn invoke(&self, value: Arc<T>, permit: Permit) {
        let subscriber = Arc::clone(&self.subscriber);
        let ctx = self.ctx.clone();
        let topic = self.topic.clone();
        let id = self.id;

        self.in_flight.spawn(async move {
            // Nested task so a panicking handler is contained and reported.
            let outcome = tokio::spawn(async move { subscriber.handle(ctx, value).await }).await;
            permit.release();

            match outcome {
                Ok(Ok(())) => trace!(topic = %topic, binding = id, "Value handled"),
                Ok(Err(err)) => error!(topic = %topic, binding = id, "Handle error: {err:#}"),
                Err(err) => error!(topic = %topic, binding = id, "Handler failed: {}", describe(err)),
            }
        });
    }
}

fn describe(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload: Box<dyn Any + Send> = err.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(|| "panicked".to_owned(), |msg| format!("panicked: {msg}"))
}
