//! Poll cycle: list each channel, keep what is new, then detail, download,
//! publish and clean up every new item in turn.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tracing::{error, info, instrument, warn};

use crate::catalog::{parse_item_url, Catalog, CatalogError};
use crate::media::{DownloadError, MediaFetcher};
use crate::model::{AdConfig, CatalogItem, ChannelRef, EpisodeId, LocalMediaHandle};
use crate::publisher::{PublishError, Publisher};
use crate::store::DedupStore;

const HISTORY_LEN: usize = 20;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("a poll cycle is already running")]
    Busy,
}

/// Failure of one item; never escapes the item boundary inside a cycle.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("invalid item URL: {0}")]
    InvalidUrl(String),
    #[error("detail fetch failed: {0}")]
    Detail(#[from] CatalogError),
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

impl ItemError {
    pub fn stage(&self) -> &'static str {
        match self {
            ItemError::InvalidUrl(_) => "parse",
            ItemError::Detail(_) => "detail",
            ItemError::Download(_) => "download",
            ItemError::Publish(_) => "publish",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishedItem {
    pub item: String,
    pub episode: EpisodeId,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub stage: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelFailure {
    pub channel: ChannelRef,
    pub not_found: bool,
    pub message: String,
}

/// Outcome of one cycle. Failures are recorded here, not returned.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub channels_checked: usize,
    pub new_items: usize,
    pub published: Vec<PublishedItem>,
    pub failures: Vec<ItemFailure>,
    pub channel_errors: Vec<ChannelFailure>,
}

impl CycleReport {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            channels_checked: 0,
            new_items: 0,
            published: Vec::new(),
            failures: Vec::new(),
            channel_errors: Vec::new(),
        }
    }
}

/// Progress line emitted while publishing a single item on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Log { message: String },
    #[serde(rename_all = "camelCase")]
    Complete { episode_id: String },
    Error { message: String },
}

impl ProgressEvent {
    pub fn log(message: impl Into<String>) -> Self {
        ProgressEvent::Log {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub channels: Vec<ChannelRef>,
    pub ads: AdConfig,
    pub recent_limit: u32,
}

/// Held for the duration of one cycle or one on-demand publish.
pub struct CyclePermit {
    _guard: OwnedMutexGuard<()>,
}

pub struct Poller {
    catalog: Arc<dyn Catalog>,
    media: Arc<dyn MediaFetcher>,
    publisher: Publisher,
    store: Mutex<DedupStore>,
    settings: PollerSettings,
    running: Arc<Mutex<()>>,
    history: StdMutex<VecDeque<CycleReport>>,
}

impl Poller {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        media: Arc<dyn MediaFetcher>,
        publisher: Publisher,
        store: DedupStore,
        settings: PollerSettings,
    ) -> Self {
        Self {
            catalog,
            media,
            publisher,
            store: Mutex::new(store),
            settings,
            running: Arc::new(Mutex::new(())),
            history: StdMutex::new(VecDeque::with_capacity(HISTORY_LEN)),
        }
    }

    pub fn channels(&self) -> &[ChannelRef] {
        &self.settings.channels
    }

    pub fn catalog(&self) -> Arc<dyn Catalog> {
        Arc::clone(&self.catalog)
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    pub async fn processed_count(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_processed(&self, id: &str) -> bool {
        self.store.lock().await.contains(id)
    }

    /// Most recent first.
    pub fn recent_cycles(&self) -> Vec<CycleReport> {
        match self.history.lock() {
            Ok(history) => history.iter().rev().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Claim the single execution slot without waiting.
    pub fn try_begin(&self) -> Result<CyclePermit, CycleError> {
        Arc::clone(&self.running)
            .try_lock_owned()
            .map(|guard| CyclePermit { _guard: guard })
            .map_err(|_| CycleError::Busy)
    }

    /// Claim the execution slot, waiting for any running cycle to finish.
    pub async fn begin(&self) -> CyclePermit {
        CyclePermit {
            _guard: Arc::clone(&self.running).lock_owned().await,
        }
    }

    /// Run one cycle, or refuse with [`CycleError::Busy`].
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let permit = self.try_begin()?;
        Ok(self.run_with(permit).await)
    }

    /// Run one cycle under an already claimed permit.
    pub async fn run_with(&self, permit: CyclePermit) -> CycleReport {
        let mut report = CycleReport::start();
        info!(channels = self.settings.channels.len(), "poll cycle started");

        for channel in &self.settings.channels {
            self.poll_channel(channel, &mut report).await;
            report.channels_checked += 1;
        }

        report.finished_at = Some(Utc::now());
        info!(
            new_items = report.new_items,
            published = report.published.len(),
            failed = report.failures.len(),
            channel_errors = report.channel_errors.len(),
            "poll cycle finished"
        );
        self.remember(report.clone());
        drop(permit);
        report
    }

    fn remember(&self, report: CycleReport) {
        if let Ok(mut history) = self.history.lock() {
            if history.len() == HISTORY_LEN {
                history.pop_front();
            }
            history.push_back(report);
        }
    }

    #[instrument(skip_all, fields(channel = %channel))]
    async fn poll_channel(&self, channel: &ChannelRef, report: &mut CycleReport) {
        info!("checking channel");
        let fresh = match self.list_new_items(channel).await {
            Ok(fresh) => fresh,
            Err(err) => {
                if err.is_not_found() {
                    error!(?err, "channel not found; configure channel ids, not display names");
                } else {
                    error!(?err, "failed to list channel");
                }
                report.channel_errors.push(ChannelFailure {
                    channel: channel.clone(),
                    not_found: err.is_not_found(),
                    message: err.to_string(),
                });
                return;
            }
        };
        report.new_items += fresh.len();

        for id in fresh {
            match self.process_item(&id, false).await {
                Ok(episode) => {
                    info!(item = %id, episode = %episode, "item published");
                    report.published.push(PublishedItem { item: id, episode });
                }
                Err(err) => {
                    error!(item = %id, stage = err.stage(), ?err, "failed to process item");
                    report.failures.push(ItemFailure {
                        item: id,
                        stage: err.stage(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    /// Resolve, list, and record every listed id as seen. Returns the ids
    /// that were not seen before, in listing order. The set is persisted
    /// before any item is processed.
    async fn list_new_items(&self, channel: &ChannelRef) -> Result<Vec<String>, CatalogError> {
        let feed = self.catalog.resolve_upload_feed(channel).await?;
        let listed = self
            .catalog
            .list_recent_items(&feed, self.settings.recent_limit)
            .await?;

        let mut store = self.store.lock().await;
        let fresh: Vec<String> = listed
            .into_iter()
            .filter(|summary| store.mark_seen(&summary.id))
            .map(|summary| summary.id)
            .collect();
        if let Err(err) = store.persist().await {
            warn!(?err, path = %store.path().display(), "failed to persist processed set; continuing with in-memory state");
        }
        info!(feed = %feed, new = fresh.len(), "listing complete");
        Ok(fresh)
    }

    async fn process_item(&self, id: &str, as_draft: bool) -> Result<EpisodeId, ItemError> {
        let item = self.catalog.fetch_item_detail(id).await?;
        info!(item = %item.id, title = %item.title, "processing item");
        let handle = self.media.download(&item).await?;
        Ok(self.publish_and_cleanup(&item, handle, as_draft).await?)
    }

    /// Publish, then delete the local media whatever the outcome.
    async fn publish_and_cleanup(
        &self,
        item: &CatalogItem,
        handle: LocalMediaHandle,
        as_draft: bool,
    ) -> Result<EpisodeId, PublishError> {
        let result = self
            .publisher
            .publish(item, &handle, &self.settings.ads, as_draft)
            .await;
        self.media.cleanup(handle).await;
        result
    }

    /// Publish one item by URL as a draft, reporting each stage on
    /// `progress`. Waits for a running cycle to finish first. The processed
    /// set is left untouched.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn publish_single(
        &self,
        url: &str,
        progress: &mpsc::UnboundedSender<ProgressEvent>,
    ) -> Result<EpisodeId, ItemError> {
        let send = |msg: String| {
            let _ = progress.send(ProgressEvent::log(msg));
        };

        if self.is_running() {
            send("Waiting for the running poll cycle to finish...".into());
        }
        let _permit = self.begin().await;

        send("Fetching video details...".into());
        let id = parse_item_url(url).ok_or_else(|| ItemError::InvalidUrl(url.to_owned()))?;
        let item = self.catalog.fetch_item_detail(&id).await?;
        send(format!("Found video: {}", item.title));

        send("Downloading video...".into());
        let handle = self.media.download(&item).await?;
        send("Video downloaded successfully".into());

        send("Uploading as draft...".into());
        let episode = self.publish_and_cleanup(&item, handle, true).await?;
        send(format!("Successfully uploaded as draft with ID: {episode}"));
        info!(item = %item.id, episode = %episode, "single item published as draft");
        Ok(episode)
    }
}
