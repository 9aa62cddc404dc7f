//! mintwatch server
//!
//! Watches a curated-projects feed and a deployer's token mints, and posts
//! one webhook notification per new event.

mod config;
mod shutdown;

use clap::Parser;
use config::{ConfigLoader, Overrides};
use mintwatch_core::Pipeline;
use shutdown::shutdown_signal;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// mintwatch - curated project and token mint alerts
#[derive(Parser, Debug)]
#[command(name = "mintwatch-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file. Stock defaults apply without one.
    #[arg(short, long, env = "MINTWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Webhook endpoint notifications are posted to
    #[arg(long, env = "DISCORD_WEBHOOK", hide_env_values = true)]
    webhook_url: Option<Url>,

    /// Override the dedup file location
    #[arg(long, env = "MINTWATCH_SEEN_FILE")]
    seen_file: Option<PathBuf>,

    /// Keep the dedup set in memory only
    #[arg(long, conflicts_with = "seen_file")]
    no_seen_file: bool,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse first: the log format is a flag
    let args = Args::parse();

    init_tracing(args.json_logs);

    tracing::info!("Starting mintwatch-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(
        args.config.as_ref(),
        Overrides {
            webhook_url: args.webhook_url,
            dedup_file: args.seen_file,
            no_dedup_file: args.no_seen_file,
        },
    );
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    match &args.config {
        Some(path) => tracing::info!("Configuration loaded from {:?}", path),
        None => tracing::info!("No configuration file given, using defaults"),
    }

    let pipeline = Pipeline::from_config(config).await;

    shutdown_signal().await;

    pipeline.shutdown();
    let stats = pipeline.join().await;
    tracing::info!(
        notified = stats.notified,
        failed = stats.failed,
        "mintwatch-server shutdown complete"
    );

    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "mintwatch-server",
            "--webhook-url",
            "https://discord.com/api/webhooks/1/abc",
            "--no-seen-file",
        ])
        .unwrap();
        assert!(args.webhook_url.is_some());
        assert!(args.no_seen_file);
        assert!(!args.json_logs);
    }

    #[test]
    fn test_seen_file_flags_conflict() {
        assert!(
            Args::try_parse_from([
                "mintwatch-server",
                "--seen-file",
                "a.json",
                "--no-seen-file"
            ])
            .is_err()
        );
    }
}
