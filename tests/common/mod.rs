#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tubecast::catalog::{Catalog, CatalogError};
use tubecast::cycle::{Poller, PollerSettings};
use tubecast::media::{DownloadError, MediaFetcher};
use tubecast::model::{
    AdConfig, CatalogItem, CatalogItemSummary, ChannelCandidate, ChannelRef, EpisodeDraft,
    EpisodeId, FeedId, LocalMediaHandle, MediaReference,
};
use tubecast::publisher::{HostingService, PublishError, Publisher};
use tubecast::store::DedupStore;

pub fn item(id: &str) -> CatalogItem {
    CatalogItem {
        id: id.into(),
        title: format!("Title {id}"),
        description: format!("Description {id}"),
        publish_date: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        thumbnail_url: Some(format!("https://i.ytimg.com/vi/{id}/maxresdefault.jpg")),
        duration_seconds: Some(3600),
        source_url: format!("https://www.youtube.com/watch?v={id}"),
    }
}

/// Channel id -> listed item ids (most recent first).
#[derive(Default)]
pub struct FakeCatalog {
    pub channels: HashMap<String, Vec<String>>,
    pub broken_details: HashSet<String>,
    pub candidates: Vec<ChannelCandidate>,
    pub detail_calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn with_channel(mut self, channel: &str, ids: &[&str]) -> Self {
        self.channels.insert(
            channel.to_string(),
            ids.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn resolve_upload_feed(&self, channel: &ChannelRef) -> Result<FeedId, CatalogError> {
        if self.channels.contains_key(channel.as_str()) {
            Ok(FeedId(format!("UU-{channel}")))
        } else {
            Err(CatalogError::NotFound(format!("no channel with id {channel}")))
        }
    }

    async fn list_recent_items(
        &self,
        feed: &FeedId,
        limit: u32,
    ) -> Result<Vec<CatalogItemSummary>, CatalogError> {
        let channel = feed.0.trim_start_matches("UU-");
        let ids = self.channels.get(channel).cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .take(limit as usize)
            .map(|id| CatalogItemSummary {
                title: format!("Title {id}"),
                id,
                published_at: None,
            })
            .collect())
    }

    async fn fetch_item_detail(&self, id: &str) -> Result<CatalogItem, CatalogError> {
        self.detail_calls.lock().unwrap().push(id.to_string());
        if self.broken_details.contains(id) {
            return Err(CatalogError::Api {
                status: 500,
                body: "backend error".into(),
            });
        }
        Ok(item(id))
    }

    async fn search_channels(&self, _query: &str) -> Result<Vec<ChannelCandidate>, CatalogError> {
        Ok(self.candidates.clone())
    }
}

/// Writes a real file per download so cleanup can be observed.
pub struct FakeMedia {
    pub work_dir: PathBuf,
    pub failing: HashSet<String>,
    pub downloads: Mutex<Vec<String>>,
}

impl FakeMedia {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            failing: HashSet::new(),
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, ids: &[&str]) -> Self {
        self.failing = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn leftover_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.work_dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl MediaFetcher for FakeMedia {
    async fn download(&self, item: &CatalogItem) -> Result<LocalMediaHandle, DownloadError> {
        self.downloads.lock().unwrap().push(item.id.clone());
        if self.failing.contains(&item.id) {
            return Err(DownloadError::Failed {
                status: "exit status: 1".into(),
                stderr: "ERROR: video unavailable".into(),
            });
        }
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let path = self.work_dir.join(format!("{}.mp4", item.id));
        tokio::fs::write(&path, b"fake media").await?;
        Ok(LocalMediaHandle::new(path))
    }

    async fn cleanup(&self, handle: LocalMediaHandle) {
        let _ = tokio::fs::remove_file(handle.path()).await;
    }
}

#[derive(Default)]
pub struct RecordingHosting {
    pub fail_create_for: HashSet<String>,
    pub uploads: Mutex<Vec<(PathBuf, bool)>>,
    pub drafts: Mutex<Vec<EpisodeDraft>>,
}

impl RecordingHosting {
    pub fn failing_registration(titles: &[&str]) -> Self {
        Self {
            fail_create_for: titles.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn drafts(&self) -> Vec<EpisodeDraft> {
        self.drafts.lock().unwrap().clone()
    }

    /// (path, file existed at upload time)
    pub fn uploads(&self) -> Vec<(PathBuf, bool)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostingService for RecordingHosting {
    async fn upload_media(&self, path: &Path) -> Result<MediaReference, PublishError> {
        let existed = path.exists();
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_path_buf(), existed));
        Ok(MediaReference(format!(
            "https://cdn.example/{}",
            path.file_name().unwrap().to_string_lossy()
        )))
    }

    async fn create_episode(&self, draft: &EpisodeDraft) -> Result<EpisodeId, PublishError> {
        self.drafts.lock().unwrap().push(draft.clone());
        if self.fail_create_for.contains(&draft.title) {
            return Err(PublishError::Rejected {
                status: 422,
                body: "invalid episode".into(),
            });
        }
        Ok(EpisodeId(format!("ep-{}", draft.title.replace(' ', "-"))))
    }
}

pub fn settings(channels: &[&str], ads: AdConfig) -> PollerSettings {
    PollerSettings {
        channels: channels.iter().map(|c| ChannelRef::new(*c)).collect(),
        ads,
        recent_limit: 10,
    }
}

pub fn poller(
    catalog: Arc<FakeCatalog>,
    media: Arc<FakeMedia>,
    publisher: Publisher,
    store: DedupStore,
    channels: &[&str],
) -> Poller {
    Poller::new(catalog, media, publisher, store, settings(channels, AdConfig::default()))
}
