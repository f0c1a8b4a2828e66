//! # Pub/Sub
//!
//! An in-process, topic-routed publish/subscribe dispatcher built on `tokio`.
//!
//! ## Overview
//!
//! Producers publish values under a [`Topic`]; every [`Subscriber`] registered for
//! that topic receives the value in its private [`Inbox`] and processes it on a
//! dedicated task. Nothing is persisted and nothing leaves the process.
//!
//! ## Features
//!
//! * **Fan-out**: any number of subscribers per topic, each with its own binding.
//! * **Bounded concurrency**: a per-subscriber [`Gate`] limits simultaneous invocations.
//! * **Backpressure**: publishing waits for inbox capacity instead of dropping values.
//! * **Graceful shutdown**: [`PubSub::stop_all`] drains in-flight work before closing inboxes.
//! * **Abrupt stop**: cancelling the registration token stops dispatchers immediately.
//! * **Fault containment**: handler errors and panics are logged, never propagated.
//!
//! # Example
//!
//! ```rust
//! use fanout_pubsub::{Inbox, PubSub, SubscribeOptions, SubscriberFn, Topic};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pubsub = PubSub::<u64>::new();
//!     let ctx = CancellationToken::new();
//!
//!     let sub = SubscriberFn::new("orders", Inbox::new(), |_ctx: CancellationToken, id: Arc<u64>| async move {
//!         anyhow::ensure!(*id > 0, "order id must be positive");
//!         Ok(())
//!     });
//!     pubsub.register(&ctx, sub, SubscribeOptions::default().with_max_concurrency(4));
//!
//!     pubsub.publish(&Topic::new("orders"), 42).await;
//!     pubsub.stop_all().await;
//! }
//! ```

mod binding;
mod error;
mod gate;
mod inbox;
mod options;
mod pubsub;
mod registry;
mod subscriber;
mod topic;

pub use error::{PubSubError, PubSubErrorExt};
pub use gate::{CONCURRENCY_UNLIMITED, Gate, Permit};
pub use inbox::{DEFAULT_INBOX_CAPACITY, Inbox};
pub use options::SubscribeOptions;
pub use pubsub::{PubSub, Publisher};
pub use registry::Registry;
pub use subscriber::{Event, Subscriber, SubscriberFn};
pub use topic::Topic;
