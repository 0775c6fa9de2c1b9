use async_trait::async_trait;
use reqwest::Url;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::cue;
use crate::megaphone::MegaphoneClient;
use crate::model::{AdConfig, CatalogItem, EpisodeDraft, EpisodeId, LocalMediaHandle, MediaReference};

#[derive(Debug, Error)]
pub enum PublishError {
    /// Missing or rejected credentials. Retrying will not help.
    #[error("hosting platform is not configured: {0}")]
    Configuration(String),
    #[error("failed to reach hosting platform: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("hosting platform error {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("failed to read media file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected hosting platform response: {0}")]
    Decode(String),
}

/// Wire-level operations against a podcast hosting platform.
#[async_trait]
pub trait HostingService: Send + Sync {
    async fn upload_media(&self, path: &Path) -> Result<MediaReference, PublishError>;

    async fn create_episode(&self, draft: &EpisodeDraft) -> Result<EpisodeId, PublishError>;
}

#[derive(Clone)]
enum Backend {
    Live(Arc<dyn HostingService>),
    /// No hosting calls; a synthetic episode id is returned.
    Test,
    Unconfigured(String),
}

/// Turns a downloaded item into a hosted episode.
#[derive(Clone)]
pub struct Publisher {
    backend: Backend,
}

impl Publisher {
    pub fn new(hosting: Arc<dyn HostingService>) -> Self {
        Self {
            backend: Backend::Live(hosting),
        }
    }

    pub fn test_mode() -> Self {
        Self {
            backend: Backend::Test,
        }
    }

    /// A publisher that fails every call with `reason`.
    pub fn unconfigured(reason: impl Into<String>) -> Self {
        Self {
            backend: Backend::Unconfigured(reason.into()),
        }
    }

    /// Pick the backend from configuration. Missing credentials do not fail
    /// here; they fail each publish with an actionable message.
    pub fn from_config(cfg: &Config) -> Self {
        if cfg.app.test_mode {
            info!("test mode: episodes will not be sent to the hosting platform");
            return Self::test_mode();
        }
        let m = &cfg.megaphone;
        if m.api_key.trim().is_empty() || m.podcast_id.trim().is_empty() {
            warn!("megaphone credentials missing; publishing will fail until MEGAPHONE_API_KEY and MEGAPHONE_PODCAST_ID are set");
            return Self::unconfigured(
                "MEGAPHONE_API_KEY and MEGAPHONE_PODCAST_ID must both be set to publish episodes",
            );
        }
        let base = if m.api_url.ends_with('/') {
            m.api_url.clone()
        } else {
            format!("{}/", m.api_url)
        };
        match Url::parse(&base) {
            Ok(url) => Self::new(Arc::new(MegaphoneClient::new(
                url,
                m.api_key.clone(),
                m.podcast_id.clone(),
            ))),
            Err(err) => Self::unconfigured(format!("invalid MEGAPHONE_API_URL {:?}: {err}", m.api_url)),
        }
    }

    pub fn is_test_mode(&self) -> bool {
        matches!(self.backend, Backend::Test)
    }

    /// Upload the media, then register the episode. If registration fails
    /// the uploaded media stays on the platform; the reference is logged.
    #[instrument(skip_all, fields(item = %item.id, draft = as_draft))]
    pub async fn publish(
        &self,
        item: &CatalogItem,
        handle: &LocalMediaHandle,
        ads: &AdConfig,
        as_draft: bool,
    ) -> Result<EpisodeId, PublishError> {
        let hosting = match &self.backend {
            Backend::Live(hosting) => hosting,
            Backend::Test => {
                let draft = build_draft(
                    item,
                    MediaReference(format!("file://{}", handle.path().display())),
                    ads,
                    as_draft,
                );
                let id = EpisodeId(format!("test-episode-{}", Uuid::new_v4()));
                info!(episode = %id, cue_points = draft.cue_points.len(), "test mode: skipped hosting calls");
                return Ok(id);
            }
            Backend::Unconfigured(reason) => {
                return Err(PublishError::Configuration(reason.clone()));
            }
        };

        let media = hosting.upload_media(handle.path()).await?;
        let draft = build_draft(item, media, ads, as_draft);
        match hosting.create_episode(&draft).await {
            Ok(id) => {
                info!(episode = %id, title = %draft.title, "episode published");
                Ok(id)
            }
            Err(err) => {
                error!(?err, media = %draft.media_reference, "episode registration failed; uploaded media left on platform");
                Err(err)
            }
        }
    }
}

/// Assemble the platform-neutral episode. `as_draft` only sets `draft`.
pub fn build_draft(
    item: &CatalogItem,
    media_reference: MediaReference,
    ads: &AdConfig,
    as_draft: bool,
) -> EpisodeDraft {
    let (pre_roll_count, post_roll_count) = if ads.enabled {
        (Some(ads.pre_roll_count), Some(ads.post_roll_count))
    } else {
        (None, None)
    };
    EpisodeDraft {
        title: item.title.clone(),
        description: item.description.clone(),
        publish_date: item.publish_date,
        thumbnail_url: item.thumbnail_url.clone(),
        media_reference,
        pre_roll_count,
        post_roll_count,
        cue_points: cue::plan(item.duration_seconds, ads),
        draft: as_draft,
    }
}
