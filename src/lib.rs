//! Polls video channels and republishes new uploads as podcast episodes.

pub mod catalog;
pub mod config;
pub mod cue;
pub mod cycle;
pub mod media;
pub mod megaphone;
pub mod model;
pub mod publisher;
pub mod scheduler;
pub mod server;
pub mod store;

use std::sync::Arc;

use catalog::YouTubeClient;
use config::Config;
use cycle::{Poller, PollerSettings};
use media::YtDlp;
use publisher::Publisher;
use store::DedupStore;

/// Wire the production components together from configuration.
pub async fn build_poller(cfg: &Config) -> Poller {
    let catalog = Arc::new(YouTubeClient::new(cfg.youtube.api_key.clone()));
    let media = Arc::new(YtDlp::with_program(&cfg.app.downloader, cfg.work_dir()));
    if let Err(err) = media.ensure_available().await {
        tracing::warn!(?err, downloader = %cfg.app.downloader, "downloader not available; downloads will fail");
    }
    let store = DedupStore::load_or_empty(cfg.state_file()).await;
    Poller::new(
        catalog,
        media,
        Publisher::from_config(cfg),
        store,
        PollerSettings {
            channels: cfg.channels(),
            ads: cfg.ads.clone(),
            recent_limit: cfg.app.recent_limit,
        },
    )
}
