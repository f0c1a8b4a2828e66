use anyhow::Context;
use clap::Parser;
use fanout_demo::{Report, load_config};
use fanout_logger::Logger;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Publishes a configurable workload through the fanout dispatcher.
#[derive(Debug, Parser)]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to a TOML config file (defaults to `fanout.toml` when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the number of values published per topic
    #[arg(short, long)]
    messages: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg =
        load_config(cli.config.as_deref()).context("Critical: Configuration is malformed")?;
    if let Some(messages) = cli.messages {
        cfg.messages = messages;
    }

    let log = Logger::from_config(env!("CARGO_PKG_NAME"), &cfg.logger)?;

    let ctx = CancellationToken::new();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling dispatchers");
            interrupt.cancel();
        }
    });

    let Report { published, handled, interrupted } = fanout_demo::run(&cfg, ctx).await?;
    info!(published, handled, interrupted, "Demo finished");

    log.flush();
    Ok(())
}
