//! Configuration: optional YAML file, overlaid by environment variables.
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::{AdConfig, ChannelRef};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value {value:?} for {name}")]
    Env { name: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub youtube: YouTube,
    #[serde(default)]
    pub megaphone: Megaphone,
    #[serde(default)]
    pub ads: AdConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct App {
    /// Downloads land here; created when missing.
    pub work_dir: String,
    pub state_file: String,
    /// Cron expression, 5 or 6 fields.
    pub check_interval: String,
    pub listen_addr: String,
    /// Items requested per channel listing.
    pub recent_limit: u32,
    pub check_on_startup: bool,
    pub test_mode: bool,
    pub downloader: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            work_dir: "./temp".into(),
            state_file: "./processed-videos.json".into(),
            check_interval: "*/5 * * * *".into(),
            listen_addr: "0.0.0.0:3000".into(),
            recent_limit: 10,
            check_on_startup: true,
            test_mode: false,
            downloader: "yt-dlp".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct YouTube {
    pub api_key: String,
    pub channel_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Megaphone {
    pub api_url: String,
    pub api_key: String,
    pub podcast_id: String,
}

impl Default for Megaphone {
    fn default() -> Self {
        Self {
            api_url: "https://api.megaphone.fm".into(),
            api_key: String::new(),
            podcast_id: String::new(),
        }
    }
}

impl Config {
    /// Ensure the work directory exists.
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(&self.app.work_dir)
    }

    pub fn channels(&self) -> Vec<ChannelRef> {
        self.youtube
            .channel_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(ChannelRef::new)
            .collect()
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.app.work_dir)
    }

    pub fn state_file(&self) -> PathBuf {
        PathBuf::from(&self.app.state_file)
    }

    /// Overlay values found through `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("TEMP_DIR") {
            self.app.work_dir = v;
        }
        if let Some(v) = get("STATE_FILE") {
            self.app.state_file = v;
        }
        if let Some(v) = get("CHECK_INTERVAL") {
            self.app.check_interval = v;
        }
        if let Some(v) = get("PORT") {
            let port: u16 = parse_num("PORT", &v)?;
            self.app.listen_addr = format!("0.0.0.0:{port}");
        }
        if let Some(v) = get("RECENT_LIMIT") {
            self.app.recent_limit = parse_num("RECENT_LIMIT", &v)?;
        }
        if let Some(v) = get("CHECK_ON_STARTUP") {
            self.app.check_on_startup = parse_bool("CHECK_ON_STARTUP", &v)?;
        }
        if let Some(v) = get("TEST_MODE") {
            self.app.test_mode = parse_bool("TEST_MODE", &v)?;
        }
        if let Some(v) = get("YTDLP_PATH") {
            self.app.downloader = v;
        }

        if let Some(v) = get("YOUTUBE_API_KEY") {
            self.youtube.api_key = v;
        }
        if let Some(v) = get("CHANNEL_IDS") {
            self.youtube.channel_ids = v
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_owned)
                .collect();
        }

        if let Some(v) = get("MEGAPHONE_API_URL") {
            self.megaphone.api_url = v;
        }
        if let Some(v) = get("MEGAPHONE_API_KEY") {
            self.megaphone.api_key = v;
        }
        if let Some(v) = get("MEGAPHONE_PODCAST_ID") {
            self.megaphone.podcast_id = v;
        }

        if let Some(v) = get("ADS_ENABLED") {
            self.ads.enabled = parse_bool("ADS_ENABLED", &v)?;
        }
        if let Some(v) = get("PRE_ROLL_COUNT") {
            self.ads.pre_roll_count = parse_num("PRE_ROLL_COUNT", &v)?;
        }
        if let Some(v) = get("POST_ROLL_COUNT") {
            self.ads.post_roll_count = parse_num("POST_ROLL_COUNT", &v)?;
        }
        if let Some(v) = get("MID_ROLL_INTERVAL") {
            self.ads.mid_roll_interval_seconds = Some(parse_num("MID_ROLL_INTERVAL", &v)?);
        }
        if let Some(v) = get("MID_ROLL_AD_COUNT") {
            self.ads.mid_roll_ad_count = parse_num("MID_ROLL_AD_COUNT", &v)?;
        }
        Ok(())
    }
}

fn parse_num<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        name,
        value: value.to_owned(),
    })
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            name,
            value: value.to_owned(),
        }),
    }
}

/// Load configuration from `path` (default `config.yaml`; a missing file means
/// defaults), overlay the process environment, and validate.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_with(path, |name| std::env::var(name).ok())
}

pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let mut cfg = match fs::read_to_string(path) {
        Ok(content) => serde_yaml::from_str(&content)?,
        Err(err) if err.kind() == ErrorKind::NotFound => Config::default(),
        Err(err) => return Err(err.into()),
    };
    cfg.apply_env(lookup)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Hosting credentials are checked at publish time, not here.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.work_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.work_dir must be non-empty"));
    }
    if cfg.app.state_file.trim().is_empty() {
        return Err(ConfigError::Invalid("app.state_file must be non-empty"));
    }
    if cfg.app.check_interval.trim().is_empty() {
        return Err(ConfigError::Invalid("app.check_interval must be non-empty"));
    }
    if !(1..=50).contains(&cfg.app.recent_limit) {
        return Err(ConfigError::Invalid("app.recent_limit must be between 1 and 50"));
    }
    if cfg.app.downloader.trim().is_empty() {
        return Err(ConfigError::Invalid("app.downloader must be non-empty"));
    }
    if cfg.youtube.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "youtube.api_key (YOUTUBE_API_KEY) must be non-empty",
        ));
    }
    Ok(())
}

/// Example YAML with every recognized key.
pub fn example() -> &'static str {
    r#"app:
  work_dir: "./temp"
  state_file: "./processed-videos.json"
  check_interval: "*/5 * * * *"
  listen_addr: "0.0.0.0:3000"
  recent_limit: 10
  check_on_startup: true
  test_mode: false
  downloader: "yt-dlp"

youtube:
  api_key: "YOUR_YOUTUBE_API_KEY"
  channel_ids:
    - "UC_x5XG1OV2P6uZZ5FSM9Ttw"

megaphone:
  api_url: "https://api.megaphone.fm"
  api_key: "YOUR_MEGAPHONE_API_KEY"
  podcast_id: "YOUR_PODCAST_ID"

ads:
  enabled: true
  pre_roll_count: 1
  post_roll_count: 1
  mid_roll_interval_seconds: 900
  mid_roll_ad_count: 2
"#
}
