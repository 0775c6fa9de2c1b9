//! Megaphone hosting-platform client and wire format.
//!
//! The rest of the crate speaks [`EpisodeDraft`]; only this module knows how
//! Megaphone spells the fields.
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::model::{EpisodeDraft, EpisodeId, MediaReference};
use crate::publisher::{HostingService, PublishError};

pub const MEGAPHONE_API_BASE: &str = "https://api.megaphone.fm/";

#[derive(Clone)]
pub struct MegaphoneClient {
    http: Client,
    base_url: Url,
    token: String,
    podcast_id: String,
}

impl fmt::Debug for MegaphoneClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MegaphoneClient")
            .field("base_url", &self.base_url)
            .field("podcast_id", &self.podcast_id)
            .finish_non_exhaustive()
    }
}

impl MegaphoneClient {
    pub fn new(base_url: Url, token: String, podcast_id: String) -> Self {
        let http = Client::builder()
            .user_agent(concat!("tubecast/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url,
            token,
            podcast_id,
        }
    }

    fn endpoint(&self, tail: &str) -> Result<Url, PublishError> {
        self.base_url
            .join(&format!("v1/podcasts/{}/{}", self.podcast_id, tail))
            .map_err(|err| PublishError::Configuration(format!("invalid Megaphone API URL: {err}")))
    }

    pub fn build_episode_request(&self, body: &Value) -> Result<reqwest::Request, PublishError> {
        let endpoint = self.endpoint("episodes")?;
        let request = self
            .http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .json(body)
            .build()?;
        Ok(request)
    }

    async fn execute<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::Request,
    ) -> Result<T, PublishError> {
        let res = self.http.execute(request).await?;
        let status = res.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = res.text().await.unwrap_or_default();
            return Err(PublishError::Configuration(format!(
                "Megaphone rejected the credentials ({status}); check MEGAPHONE_API_KEY and MEGAPHONE_PODCAST_ID: {body}"
            )));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        let body = res.text().await?;
        serde_json::from_str(&body).map_err(|err| PublishError::Decode(err.to_string()))
    }
}

#[async_trait]
impl HostingService for MegaphoneClient {
    #[instrument(skip_all, fields(path = %path.display()))]
    async fn upload_media(&self, path: &Path) -> Result<MediaReference, PublishError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("media.mp4")
            .to_owned();
        let bytes = fs::read(path).await?;
        let size = bytes.len();
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes)
                .file_name(file_name)
                .mime_str(content_type(path))?,
        );
        let request = self
            .http
            .post(self.endpoint("uploads")?)
            .header("Authorization", format!("Bearer {}", self.token))
            .multipart(form)
            .build()?;
        debug!(url = %request.url(), size, "uploading media");

        let res: UploadResponse = self.execute(request).await?;
        info!(media = %res.url, "media uploaded");
        Ok(MediaReference(res.url))
    }

    async fn create_episode(&self, draft: &EpisodeDraft) -> Result<EpisodeId, PublishError> {
        let body = episode_payload(draft);
        let request = self.build_episode_request(&body)?;
        debug!(url = %request.url(), payload = %body, "registering episode");
        let res: CreateEpisodeResponse = self.execute(request).await?;
        info!(episode = %res.id, draft = draft.draft, "episode registered");
        Ok(EpisodeId(res.id))
    }
}

/// Megaphone JSON body for an episode. Ad fields appear only when the draft
/// carries roll counts, i.e. when ads are enabled.
pub fn episode_payload(draft: &EpisodeDraft) -> Value {
    let mut body = Map::new();
    body.insert("title".into(), json!(draft.title));
    body.insert("summary".into(), json!(draft.description));
    body.insert("pubdate".into(), json!(draft.publish_date.to_rfc3339()));
    body.insert("draft".into(), json!(draft.draft));
    body.insert(
        "backgroundAudioFileUrl".into(),
        json!(draft.media_reference.0),
    );
    if let Some(url) = draft.thumbnail_url.as_deref().filter(|u| !u.is_empty()) {
        body.insert("imageFile".into(), json!(url));
    }

    if let (Some(pre), Some(post)) = (draft.pre_roll_count, draft.post_roll_count) {
        body.insert("preCount".into(), json!(pre));
        body.insert("postCount".into(), json!(post));
        let insertion_points: Vec<u64> = draft
            .cue_points
            .iter()
            .map(|c| c.start_time_seconds)
            .collect();
        body.insert("insertionPoints".into(), json!(insertion_points));
        let cuepoints: Vec<Value> = draft
            .cue_points
            .iter()
            .map(|c| {
                json!({
                    "cuepointType": c.kind.as_str(),
                    "startTime": c.start_time_seconds,
                    "adCount": c.ad_count,
                    "isActive": c.is_active,
                })
            })
            .collect();
        body.insert("cuepoints".into(), Value::Array(cuepoints));
    }

    Value::Object(body)
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("m4a") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(alias = "uploadUrl", alias = "fileUrl")]
    url: String,
}

#[derive(Deserialize)]
struct CreateEpisodeResponse {
    id: String,
}
