//! # Fanout demo
//!
//! Drives a [`PubSub<String>`](fanout_pubsub::PubSub) with the topics and subscribers
//! described by a [`DemoConfig`], then shuts it down gracefully.

pub mod config;

pub use config::{ConfigError, DemoConfig, TopicConfig, load_config};

use fanout_pubsub::{Inbox, PubSub, SubscriberFn};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of a finished [`run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    /// Values handed to [`PubSub::publish`].
    pub published: usize,
    /// Handler invocations that completed successfully.
    pub handled: usize,
    /// Whether `ctx` was cancelled before the workload finished.
    pub interrupted: bool,
}

/// Registers every configured subscriber, publishes `config.messages` values per topic
/// and stops all topics.
///
/// Cancelling `ctx` stops publishing and makes the dispatchers exit without draining;
/// values already in flight still finish before this returns.
///
/// # Errors
/// Returns an error if a topic asks for an invalid inbox capacity.
pub async fn run(config: &DemoConfig, ctx: CancellationToken) -> anyhow::Result<Report> {
    let pubsub = PubSub::<String>::new();
    let handled = Arc::new(AtomicUsize::new(0));

    for topic in &config.topics {
        let work = Duration::from_millis(topic.work_ms);
        let mut subscribers = Vec::with_capacity(topic.subscribers);
        for _ in 0..topic.subscribers {
            let handled = Arc::clone(&handled);
            let inbox = Inbox::<String>::with_capacity(topic.inbox_capacity)?;
            subscribers.push(SubscriberFn::new(
                topic.name.clone(),
                inbox,
                move |ctx: CancellationToken, value: Arc<String>| {
                    let handled = Arc::clone(&handled);
                    async move {
                        tokio::select! {
                            () = ctx.cancelled() => anyhow::bail!("cancelled while handling {value}"),
                            () = tokio::time::sleep(work) => {},
                        }
                        debug!(value = %value, "Value handled");
                        handled.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }
                },
            ));
        }
        pubsub.register_all(&ctx, subscribers, topic.options());
        info!(
            topic = %topic.name,
            subscribers = topic.subscribers,
            max_concurrency = topic.max_concurrency,
            inbox_capacity = topic.inbox_capacity,
            "Topic ready"
        );
    }

    let mut published = 0;
    'publish: for n in 0..config.messages {
        for topic in &config.topics {
            if ctx.is_cancelled() {
                warn!(published, "Publishing interrupted");
                break 'publish;
            }
            pubsub.publish(&topic.name, format!("{}#{n}", topic.name)).await;
            published += 1;
        }
    }

    info!(topics = pubsub.topic_count(), "Stopping all topics");
    pubsub.stop_all().await;

    Ok(Report { published, handled: handled.load(Ordering::Relaxed), interrupted: ctx.is_cancelled() })
}
