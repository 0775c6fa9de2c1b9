use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::model::{CatalogItem, LocalMediaHandle};

/// Prefer a single combined mp4 stream, otherwise whatever is best.
const FORMAT_SELECTOR: &str = "best[ext=mp4]/best";
const STDERR_TAIL: usize = 2000;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to prepare work dir: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("downloader exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("downloader reported success but produced no file at {0}")]
    MissingOutput(PathBuf),
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn download(&self, item: &CatalogItem) -> Result<LocalMediaHandle, DownloadError>;

    /// Best-effort delete; failures are logged, never returned.
    async fn cleanup(&self, handle: LocalMediaHandle);
}

/// Downloads media with `yt-dlp` into a work directory.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    work_dir: PathBuf,
}

impl YtDlp {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self::with_program("yt-dlp", work_dir)
    }

    pub fn with_program(program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Where the media for `id` lands. Same id, same path.
    pub fn media_path(&self, id: &str) -> PathBuf {
        self.work_dir.join(format!("{}.mp4", sanitize_id(id)))
    }

    /// Probe the downloader with `--version`.
    pub async fn ensure_available(&self) -> Result<(), DownloadError> {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| DownloadError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(DownloadError::Failed {
                status: status.to_string(),
                stderr: String::new(),
            })
        }
    }

    async fn run(&self, url: &str, target: &Path) -> Result<(), DownloadError> {
        let output = Command::new(&self.program)
            .arg("--no-playlist")
            .arg("-f")
            .arg(FORMAT_SELECTOR)
            .arg("-o")
            .arg(target.as_os_str())
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| DownloadError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(DownloadError::Failed {
                status: output.status.to_string(),
                stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL),
            });
        }
        if !tokio::fs::try_exists(target).await.unwrap_or(false) {
            return Err(DownloadError::MissingOutput(target.to_path_buf()));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaFetcher for YtDlp {
    #[instrument(skip_all, fields(item = %item.id))]
    async fn download(&self, item: &CatalogItem) -> Result<LocalMediaHandle, DownloadError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let target = self.media_path(&item.id);
        info!(title = %item.title, path = %target.display(), "downloading media");

        match self.run(&item.source_url, &target).await {
            Ok(()) => {
                info!(path = %target.display(), "download finished");
                Ok(LocalMediaHandle::new(target))
            }
            Err(err) => {
                remove_partials(&target).await;
                Err(err)
            }
        }
    }

    async fn cleanup(&self, handle: LocalMediaHandle) {
        remove_quietly(handle.path()).await;
    }
}

/// Keep ids usable as file names: anything outside `[A-Za-z0-9_-]` becomes `_`.
pub fn sanitize_id(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_owned()
    } else {
        cleaned
    }
}

async fn remove_partials(target: &Path) {
    let mut part = target.as_os_str().to_owned();
    part.push(".part");
    remove_quietly(target).await;
    remove_quietly(Path::new(&part)).await;
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed media file"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(?err, path = %path.display(), "failed to remove media file"),
    }
}

fn tail(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.len() <= max {
        return s.to_owned();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_owned()
}
