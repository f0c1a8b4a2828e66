use fanout_pubsub::{Inbox, Subscriber, Topic};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A topic name nobody else in the test binary will pick.
pub fn random_topic() -> Topic {
    Topic::new(nanoid::nanoid!(10))
}

/// Test subscriber that reports every value it handles.
pub struct Recorder {
    topic: Topic,
    inbox: Inbox<String>,
    delay: Option<Duration>,
    fail_on: Option<&'static str>,
    panic_on: Option<&'static str>,
    started: mpsc::UnboundedSender<String>,
    received: mpsc::UnboundedSender<String>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// The observing side of a [`Recorder`].
pub struct Probe {
    pub started: mpsc::UnboundedReceiver<String>,
    pub received: mpsc::UnboundedReceiver<String>,
    peak: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn new(topic: &Topic) -> (Self, Probe) {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        let (received_tx, received_rx) = mpsc::unbounded_channel();
        let peak = Arc::new(AtomicUsize::new(0));

        let recorder = Self {
            topic: topic.clone(),
            inbox: Inbox::new(),
            delay: None,
            fail_on: None,
            panic_on: None,
            started: started_tx,
            received: received_tx,
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::clone(&peak),
        };
        (recorder, Probe { started: started_rx, received: received_rx, peak })
    }

    pub fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox = Inbox::with_capacity(capacity).expect("capacity must be positive");
        self
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub const fn failing_on(mut self, value: &'static str) -> Self {
        self.fail_on = Some(value);
        self
    }

    pub const fn panicking_on(mut self, value: &'static str) -> Self {
        self.panic_on = Some(value);
        self
    }
}

impl Subscriber<String> for Recorder {
    fn topic(&self) -> Topic {
        self.topic.clone()
    }

    fn inbox(&self) -> &Inbox<String> {
        &self.inbox
    }

    async fn handle(&self, _ctx: CancellationToken, value: Arc<String>) -> anyhow::Result<()> {
        let _ = self.started.send(value.as_str().to_owned());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on == Some(value.as_str()) {
            panic!("recorder told to panic on {value}");
        }
        if self.fail_on == Some(value.as_str()) {
            anyhow::bail!("recorder told to fail on {value}");
        }

        let _ = self.received.send(value.as_str().to_owned());
        Ok(())
    }
}

impl Probe {
    /// Highest number of simultaneous invocations observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Every value handled so far, without waiting.
    pub fn handled(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.received.try_recv().ok()).collect()
    }

    /// Waits up to `within` for the next handled value.
    pub async fn next(&mut self, within: Duration) -> Option<String> {
        tokio::time::timeout(within, self.received.recv()).await.ok().flatten()
    }
}
