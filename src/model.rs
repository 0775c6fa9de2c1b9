use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable identifier of a source channel on the catalog platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelRef(pub String);

impl ChannelRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The upload feed (playlist) a channel publishes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedId(pub String);

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listing entry: just enough to decide whether the item is new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItemSummary {
    pub id: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Full metadata of one catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub publish_date: DateTime<Utc>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<u64>,
    pub source_url: String,
}

/// Search hit returned by the interactive channel lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCandidate {
    pub channel_id: String,
    pub channel_title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
}

/// Ad insertion settings applied to every published episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub pre_roll_count: u32,
    #[serde(default)]
    pub post_roll_count: u32,
    #[serde(default)]
    pub mid_roll_interval_seconds: Option<i64>,
    #[serde(default = "default_mid_roll_ad_count")]
    pub mid_roll_ad_count: u32,
}

fn default_mid_roll_ad_count() -> u32 {
    1
}

impl Default for AdConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pre_roll_count: 0,
            post_roll_count: 0,
            mid_roll_interval_seconds: None,
            mid_roll_ad_count: default_mid_roll_ad_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueKind {
    Midroll,
}

impl CueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CueKind::Midroll => "midroll",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CuePoint {
    pub kind: CueKind,
    pub start_time_seconds: u64,
    pub ad_count: u32,
    pub is_active: bool,
}

impl CuePoint {
    pub fn midroll(start_time_seconds: u64, ad_count: u32) -> Self {
        Self {
            kind: CueKind::Midroll,
            start_time_seconds,
            ad_count,
            is_active: true,
        }
    }
}

/// Reference to media already uploaded to the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MediaReference(pub String);

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EpisodeId(pub String);

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform-neutral episode payload. Wire formats are derived from this in
/// the hosting adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeDraft {
    pub title: String,
    pub description: String,
    pub publish_date: DateTime<Utc>,
    pub thumbnail_url: Option<String>,
    pub media_reference: MediaReference,
    /// `None` when ads are disabled.
    pub pre_roll_count: Option<u32>,
    /// `None` when ads are disabled.
    pub post_roll_count: Option<u32>,
    pub cue_points: Vec<CuePoint>,
    pub draft: bool,
}

/// Local file holding one item's downloaded media.
#[derive(Debug, PartialEq, Eq)]
pub struct LocalMediaHandle {
    path: PathBuf,
}

impl LocalMediaHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
