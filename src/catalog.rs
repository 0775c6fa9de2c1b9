use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::model::{CatalogItem, CatalogItemSummary, ChannelCandidate, ChannelRef, FeedId};

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3/";
const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";

/// Upper bound on channel search hits.
pub const SEARCH_LIMIT: u32 = 5;
/// The listing endpoint refuses pages above this size.
const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The channel or item does not exist. Not worth retrying.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("failed to reach catalog API: {0}")]
    Transport(reqwest::Error),
    #[error("catalog API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected catalog response: {0}")]
    Decode(String),
}

/// The request URL carries the API key, so it is stripped before the error
/// can reach a log line or a response body.
impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::Transport(err.without_url())
    }
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn resolve_upload_feed(&self, channel: &ChannelRef) -> Result<FeedId, CatalogError>;

    /// Most recent first, at most `limit` entries.
    async fn list_recent_items(
        &self,
        feed: &FeedId,
        limit: u32,
    ) -> Result<Vec<CatalogItemSummary>, CatalogError>;

    async fn fetch_item_detail(&self, id: &str) -> Result<CatalogItem, CatalogError>;

    async fn search_channels(&self, query: &str) -> Result<Vec<ChannelCandidate>, CatalogError>;
}

/// YouTube Data API v3 client.
#[derive(Clone)]
pub struct YouTubeClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for YouTubeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YouTubeClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl YouTubeClient {
    pub fn new(api_key: String) -> Self {
        let base_url = Url::parse(YOUTUBE_API_BASE).expect("valid default YouTube URL");
        Self::with_base_url(api_key, base_url)
    }

    pub fn with_base_url(api_key: String, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent(concat!("tubecast/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url,
            api_key,
        }
    }

    pub fn build_request(
        &self,
        resource: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Request, CatalogError> {
        let endpoint = self
            .base_url
            .join(resource)
            .map_err(|err| CatalogError::Decode(format!("invalid catalog base URL: {err}")))?;
        let request = self
            .http
            .get(endpoint)
            .query(&[("key", self.api_key.as_str())])
            .query(params)
            .build()?;
        Ok(request)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let request = self.build_request(resource, params)?;
        debug!(resource, ?params, "sending catalog request");
        let res = self.http.execute(request).await?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            let body = res.text().await.unwrap_or_default();
            return Err(CatalogError::NotFound(format!("{resource}: {body}")));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(CatalogError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let body = res.text().await?;
        serde_json::from_str(&body).map_err(|err| CatalogError::Decode(err.to_string()))
    }
}

#[async_trait]
impl Catalog for YouTubeClient {
    async fn resolve_upload_feed(&self, channel: &ChannelRef) -> Result<FeedId, CatalogError> {
        let res: ListResponse<ChannelResource> = self
            .get_json(
                "channels",
                &[("id", channel.as_str()), ("part", "contentDetails")],
            )
            .await?;
        debug!(channel=%channel, items = res.items.len(), "channel lookup");
        uploads_feed(channel, res)
    }

    async fn list_recent_items(
        &self,
        feed: &FeedId,
        limit: u32,
    ) -> Result<Vec<CatalogItemSummary>, CatalogError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let max_results = limit.to_string();
        let res: ListResponse<PlaylistItemResource> = self
            .get_json(
                "playlistItems",
                &[
                    ("playlistId", feed.0.as_str()),
                    ("part", "snippet"),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;
        Ok(summaries(res, limit as usize))
    }

    async fn fetch_item_detail(&self, id: &str) -> Result<CatalogItem, CatalogError> {
        let res: ListResponse<VideoResource> = self
            .get_json("videos", &[("id", id), ("part", "snippet,contentDetails")])
            .await?;
        item_detail(id, res)
    }

    async fn search_channels(&self, query: &str) -> Result<Vec<ChannelCandidate>, CatalogError> {
        let max_results = SEARCH_LIMIT.to_string();
        let res: ListResponse<SearchResource> = self
            .get_json(
                "search",
                &[
                    ("q", query),
                    ("type", "channel"),
                    ("part", "snippet"),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;
        Ok(candidates(res))
    }
}

/// Canonical watch URL for an item id.
pub fn source_url(id: &str) -> String {
    format!("{WATCH_URL_BASE}{id}")
}

static ITEM_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/shorts/)([A-Za-z0-9_-]+)")
        .expect("valid item URL regex")
});

/// Extract the item id from a watch / short / shortened URL.
pub fn parse_item_url(url: &str) -> Option<String> {
    ITEM_URL
        .captures(url.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
}

static ISO_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
        .expect("valid duration regex")
});

/// Seconds in an ISO-8601 duration such as `PT1H2M3S` or `P1DT30M`.
pub fn parse_iso8601_duration(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw == "P" || raw.ends_with('T') {
        return None;
    }
    let caps = ISO_DURATION.captures(raw)?;
    let field = |idx: usize| -> Option<u64> {
        match caps.get(idx) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    let weeks = field(1)?;
    let days = field(2)?;
    let hours = field(3)?;
    let minutes = field(4)?;
    let seconds = field(5)?;
    let days = weeks.checked_mul(7)?.checked_add(days)?;
    let hours = days.checked_mul(24)?.checked_add(hours)?;
    let minutes = hours.checked_mul(60)?.checked_add(minutes)?;
    minutes.checked_mul(60)?.checked_add(seconds)
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResource {
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemResource {
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemSnippet {
    #[serde(default)]
    title: String,
    published_at: Option<DateTime<Utc>>,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    snippet: VideoSnippet,
    content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    published_at: DateTime<Utc>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    maxres: Option<Thumbnail>,
    standard: Option<Thumbnail>,
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

impl Thumbnails {
    /// Highest resolution first.
    fn best(&self) -> Option<String> {
        [
            &self.maxres,
            &self.standard,
            &self.high,
            &self.medium,
            &self.default,
        ]
        .into_iter()
        .flatten()
        .map(|t| t.url.clone())
        .next()
    }
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResource {
    id: SearchId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchSnippet {
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

fn uploads_feed(
    channel: &ChannelRef,
    res: ListResponse<ChannelResource>,
) -> Result<FeedId, CatalogError> {
    let first = res.items.into_iter().next().ok_or_else(|| {
        CatalogError::NotFound(format!(
            "no channel with id {channel} (channel ids, not display names, are required)"
        ))
    })?;
    first
        .content_details
        .and_then(|d| d.related_playlists)
        .and_then(|p| p.uploads)
        .map(FeedId)
        .ok_or_else(|| CatalogError::NotFound(format!("no uploads feed for channel {channel}")))
}

fn summaries(res: ListResponse<PlaylistItemResource>, limit: usize) -> Vec<CatalogItemSummary> {
    res.items
        .into_iter()
        .filter_map(|item| {
            let id = item.snippet.resource_id.video_id?;
            Some(CatalogItemSummary {
                id,
                title: item.snippet.title,
                published_at: item.snippet.published_at,
            })
        })
        .take(limit)
        .collect()
}

fn item_detail(id: &str, res: ListResponse<VideoResource>) -> Result<CatalogItem, CatalogError> {
    let video = res
        .items
        .into_iter()
        .next()
        .ok_or_else(|| CatalogError::NotFound(format!("no item with id {id}")))?;
    let duration_seconds = video
        .content_details
        .and_then(|d| d.duration)
        .and_then(|d| parse_iso8601_duration(&d));
    Ok(CatalogItem {
        id: id.to_owned(),
        thumbnail_url: video.snippet.thumbnails.best(),
        title: video.snippet.title,
        description: video.snippet.description,
        publish_date: video.snippet.published_at,
        duration_seconds,
        source_url: source_url(id),
    })
}

fn candidates(res: ListResponse<SearchResource>) -> Vec<ChannelCandidate> {
    res.items
        .into_iter()
        .filter_map(|hit| {
            let channel_id = hit.id.channel_id?;
            let channel_title = if hit.snippet.channel_title.is_empty() {
                hit.snippet.title
            } else {
                hit.snippet.channel_title
            };
            Some(ChannelCandidate {
                channel_id,
                channel_title,
                description: hit.snippet.description,
                thumbnail_url: hit.snippet.thumbnails.default.map(|t| t.url),
            })
        })
        .take(SEARCH_LIMIT as usize)
        .collect()
}
