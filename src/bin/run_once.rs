use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use tubecast::{build_poller, config};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Run a single poll cycle over all configured channels and exit"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Exit non-zero when any item or channel failed
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(args.config.as_path()))?;
    cfg.ensure_dirs()
        .with_context(|| format!("creating work dir {}", cfg.app.work_dir))?;

    let poller = build_poller(&cfg).await;
    let report = poller.run_cycle().await?;

    for p in &report.published {
        info!(item = %p.item, episode = %p.episode, "published");
    }
    for f in &report.failures {
        warn!(item = %f.item, stage = f.stage, error = %f.message, "failed");
    }
    for c in &report.channel_errors {
        warn!(channel = %c.channel, error = %c.message, "channel skipped");
    }
    info!(
        new_items = report.new_items,
        published = report.published.len(),
        "cycle finished"
    );

    if args.strict && (!report.failures.is_empty() || !report.channel_errors.is_empty()) {
        anyhow::bail!(
            "{} item(s) and {} channel(s) failed",
            report.failures.len(),
            report.channel_errors.len()
        );
    }
    Ok(())
}
