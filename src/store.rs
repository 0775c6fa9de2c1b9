//! Processed-item set persisted as a JSON array of ids.
//!
//! The file is rewritten in full on every `persist`: a temp file in the same
//! directory is written, synced to disk, then renamed over the old snapshot.
use std::collections::HashSet;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::{fs, task};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file is not a JSON array of ids: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    seen: HashSet<String>,
}

impl DedupStore {
    /// Empty store bound to `path`; nothing is read.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen: HashSet::new(),
        }
    }

    /// Load the persisted set. A missing file yields an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let seen = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<String>>(&bytes)?
                .into_iter()
                .collect(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path=%path.display(), "no previous state file found, starting fresh");
                HashSet::new()
            }
            Err(err) => return Err(err.into()),
        };
        debug!(path=%path.display(), count = seen.len(), "loaded processed set");
        Ok(Self { path, seen })
    }

    /// Like [`DedupStore::load`] but degrades to an empty store when the file
    /// cannot be read or parsed.
    pub async fn load_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(path.clone()).await {
            Ok(store) => store,
            Err(err) => {
                warn!(?err, path=%path.display(), "failed to load processed set; starting empty");
                Self::empty(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Record `id`. Returns `true` when the id was not seen before.
    pub fn mark_seen(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_owned())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Write the set through a synced temp file in the same directory, then
    /// rename it over the target.
    pub async fn persist(&self) -> Result<(), PersistenceError> {
        // Sorted so the file diffs cleanly between runs.
        let mut ids: Vec<String> = self.seen.iter().cloned().collect();
        ids.sort_unstable();
        let body = serde_json::to_vec_pretty(&ids)?;

        let path = self.path.clone();
        task::spawn_blocking(move || write_atomic(&path, &body))
            .await
            .map_err(|err| io::Error::new(ErrorKind::Other, err))??;
        debug!(path=%self.path.display(), count = ids.len(), "persisted processed set");
        Ok(())
    }
}

fn write_atomic(target: &Path, body: &[u8]) -> io::Result<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(body)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(target).map_err(|err| err.error)?;
    Ok(())
}
