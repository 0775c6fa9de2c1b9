use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use tubecast::{build_poller, config, scheduler, server};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file (optional; environment variables override it)
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
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

    let poller = Arc::new(build_poller(&cfg).await);
    if poller.channels().is_empty() {
        warn!("no channels configured; only manual uploads will do anything");
    }

    let mut sched = scheduler::start(Arc::clone(&poller), &cfg.app.check_interval).await?;

    if cfg.app.check_on_startup {
        let startup = Arc::clone(&poller);
        tokio::spawn(async move {
            scheduler::run_logged(&startup, "startup").await;
        });
    }

    let app = server::router(server::AppState::new(
        Arc::clone(&poller),
        cfg.app.check_interval.clone(),
    ));
    let listener = tokio::net::TcpListener::bind(&cfg.app.listen_addr)
        .await
        .with_context(|| format!("binding to {}", cfg.app.listen_addr))?;
    info!(
        addr = %cfg.app.listen_addr,
        channels = ?cfg.youtube.channel_ids,
        check_interval = %cfg.app.check_interval,
        "server running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")?;

    if let Err(err) = sched.shutdown().await {
        warn!(?err, "failed to stop scheduler cleanly");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to install Ctrl+C handler");
    }
    info!("shutting down");
}
