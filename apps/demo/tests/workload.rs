use fanout_demo::{DemoConfig, Report, TopicConfig, run};
use fanout_pubsub::Topic;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn topic(name: &str, subscribers: usize, max_concurrency: usize, work_ms: u64) -> TopicConfig {
    TopicConfig {
        name: Topic::new(name),
        subscribers,
        max_concurrency,
        inbox_capacity: 1,
        work_ms,
    }
}

#[tokio::test]
async fn test_every_subscriber_handles_every_value() {
    let cfg = DemoConfig {
        messages: 5,
        topics: vec![topic("orders", 3, 2, 1), topic("audit", 1, 1, 0)],
        ..DemoConfig::default()
    };

    let report = run(&cfg, CancellationToken::new()).await.unwrap();

    assert_eq!(report, Report { published: 10, handled: 5 * 3 + 5, interrupted: false });
}

#[tokio::test]
async fn test_no_topics_publishes_nothing() {
    let cfg = DemoConfig { topics: Vec::new(), ..DemoConfig::default() };
    let report = run(&cfg, CancellationToken::new()).await.unwrap();
    assert_eq!(report, Report::default());
}

#[tokio::test]
async fn test_invalid_inbox_capacity_is_rejected() {
    let mut bad = topic("orders", 1, 0, 0);
    bad.inbox_capacity = 0;
    let cfg = DemoConfig { topics: vec![bad], ..DemoConfig::default() };

    assert!(run(&cfg, CancellationToken::new()).await.is_err());
}

#[tokio::test]
async fn test_cancelled_run_returns_promptly() {
    let cfg = DemoConfig {
        messages: 1_000,
        topics: vec![topic("slow", 2, 1, 10_000)],
        ..DemoConfig::default()
    };
    let ctx = CancellationToken::new();
    let trigger = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(5), run(&cfg, ctx))
        .await
        .expect("cancelled run must not hang")
        .unwrap();

    assert!(report.interrupted);
    assert!(report.published < 2_000);
    assert_eq!(report.handled, 0);
}
