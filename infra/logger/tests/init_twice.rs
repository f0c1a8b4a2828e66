use fanout_logger::{Logger, LoggerConfig, LoggerError, LoggerErrorExt};

#[test]
fn second_config_install_keeps_first_logger() {
    let config = LoggerConfig { level: "warn".to_owned(), ..LoggerConfig::default() };
    let first = Logger::from_config("fanout-first", &config).expect("first install succeeds");
    assert!(!first.has_file_output());

    let err = Logger::from_config("fanout-second", &LoggerConfig::default())
        .context("demo restart")
        .expect_err("global subscriber is already set");

    assert!(matches!(err, LoggerError::Subscriber { .. }), "unexpected error: {err}");
    assert!(err.to_string().contains("(demo restart)"), "context missing: {err}");

    tracing::warn!(topic = "orders", "Still logging through the first subscriber");
    first.flush();
}
