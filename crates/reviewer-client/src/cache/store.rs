use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    fs,
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, info, warn};

use super::stats::CacheStats;

/// A whole-file JSON mirror of an in-memory map.
///
/// Every save serialises the complete structure and replaces the file by
/// writing a sibling temp file and renaming it over the target. Callers hold
/// the state lock across mutate-then-save so overlapping saves cannot regress
/// the file.
#[derive(Debug)]
pub struct JsonFileStore<M> {
    path: PathBuf,
    state: Mutex<M>,
    stats: CacheStats,
}

impl<M> JsonFileStore<M>
where
    M: Serialize + DeserializeOwned + Default + Send,
{
    /// Loads `path`, starting empty if the file is missing or unreadable.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let state = match Self::read(&path).await {
            Ok(Some(state)) => {
                info!(target: "reviewer_cache", path = %path.display(), "loaded cache file");
                state
            }
            Ok(None) => {
                debug!(target: "reviewer_cache", path = %path.display(), "no cache file yet, starting empty");
                M::default()
            }
            Err(error) => {
                warn!(
                    target: "reviewer_cache",
                    path = %path.display(),
                    error = %format!("{error:#}"),
                    "failed to load cache file, starting empty"
                );
                M::default()
            }
        };

        Self {
            path,
            state: Mutex::new(state),
            stats: CacheStats::new(),
        }
    }

    async fn read(path: &Path) -> Result<Option<M>> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error).with_context(|| format!("failed to read cache file {path:?}"))
            }
        };
        let state = serde_json::from_slice(&data)
            .with_context(|| format!("failed to deserialize cache file {path:?}"))?;
        Ok(Some(state))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub async fn lock(&self) -> MutexGuard<'_, M> {
        self.state.lock().await
    }

    /// Writes `state` to disk, propagating failures.
    pub async fn persist(&self, state: &M) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create cache dir {parent:?}"))?;
        }

        let payload = serde_json::to_vec_pretty(state).context("failed to serialize cache")?;
        let staging = self.staging_path();
        fs::write(&staging, &payload)
            .await
            .with_context(|| format!("failed to write cache file {staging:?}"))?;
        fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("failed to replace cache file {:?}", self.path))?;

        debug!(target: "reviewer_cache", file = ?self.path, bytes = payload.len(), "wrote cache file");
        Ok(())
    }

    /// Writes `state` to disk; failures are logged and counted, never returned.
    pub async fn save(&self, state: &M) {
        match self.persist(state).await {
            Ok(()) => self.stats.record_write(),
            Err(error) => {
                self.stats.record_write_failure();
                warn!(
                    target: "reviewer_cache",
                    path = %self.path.display(),
                    error = %format!("{error:#}"),
                    "failed to save cache file"
                );
            }
        }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
