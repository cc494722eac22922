use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

use super::CacheService;
use crate::BoxError;

#[derive(Debug, Error)]
pub enum FileCacheError {
    #[error("no platform cache directory found; set an explicit cache file path")]
    NoCacheDir,

    #[error("failed to access cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode cache file {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    /// Milliseconds since the Unix epoch.
    timestamp: u64,
    /// Milliseconds.
    ttl: u64,
    exp: u64,
    data: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheData {
    cache: HashMap<String, CacheEntry>,
}

/// Cache stored as a JSON file, surviving process restarts.
///
/// Every operation reads and rewrites the whole file. Expired entries are
/// removed when read.
#[derive(Debug)]
pub struct FileCache {
    path: Option<PathBuf>,
    lock: Mutex<()>,
}

impl FileCache {
    pub const DIR_NAME: &'static str = "config-shape";
    pub const DEFAULT_FILE_NAME: &'static str = "config_builder_cache.json";

    /// Uses [`Self::DEFAULT_FILE_NAME`] under the platform cache directory.
    pub fn new() -> Self {
        Self::with_file_name(Self::DEFAULT_FILE_NAME)
    }

    /// Uses `file_name` under the platform cache directory.
    pub fn with_file_name(file_name: impl AsRef<Path>) -> Self {
        Self {
            path: dirs::cache_dir().map(|dir| dir.join(Self::DIR_NAME).join(file_name)),
            lock: Mutex::new(()),
        }
    }

    /// Uses an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Deletes the cache file if it exists. Its directory is kept.
    pub async fn clear(&self) -> Result<(), FileCacheError> {
        let path = self.require_path()?;
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(path, e)),
        }
    }

    fn require_path(&self) -> Result<&Path, FileCacheError> {
        self.path.as_deref().ok_or(FileCacheError::NoCacheDir)
    }

    async fn read(&self, path: &Path) -> Result<CacheData, FileCacheError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CacheData::default()),
            Err(e) => return Err(io_error(path, e)),
        };
        match serde_json::from_str(&contents) {
            Ok(data) => Ok(data),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable cache file");
                Ok(CacheData::default())
            }
        }
    }

    async fn write(&self, path: &Path, data: &CacheData) -> Result<(), FileCacheError> {
        let contents = serde_json::to_string(data).map_err(|e| FileCacheError::Encode {
            path: path.to_path_buf(),
            source: e,
        })?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        // Readers through another handle must never see a half-written file.
        let staging = staging_path(path);
        tokio::fs::write(&staging, contents)
            .await
            .map_err(|e| io_error(&staging, e))?;
        if let Err(e) = tokio::fs::rename(&staging, path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(io_error(path, e));
        }
        Ok(())
    }
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> FileCacheError {
    FileCacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A sibling of `path` unique to this process and write.
fn staging_path(path: &Path) -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(
        ".{}.{}.tmp",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    ));
    path.with_file_name(name)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

#[async_trait]
impl CacheService for FileCache {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        let path = self.require_path()?;
        let _guard = self.lock.lock().await;
        let mut data = self.read(path).await?;

        let Some(entry) = data.cache.get(key) else {
            return Ok(None);
        };
        if entry.exp > now_millis() {
            return Ok(Some(entry.data.clone()));
        }

        data.cache.remove(key);
        self.write(path, &data).await?;
        Ok(None)
    }

    async fn set(&self, key: &str, data: String, ttl: Duration) -> Result<bool, BoxError> {
        if ttl.is_zero() {
            return Ok(false);
        }
        let path = self.require_path()?;
        let _guard = self.lock.lock().await;
        let mut cache = self.read(path).await?;

        let timestamp = now_millis();
        let ttl = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        cache.cache.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                timestamp,
                ttl,
                exp: timestamp.saturating_add(ttl),
                data,
            },
        );
        self.write(path, &cache).await?;
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<bool, BoxError> {
        let path = self.require_path()?;
        let _guard = self.lock.lock().await;
        let mut data = self.read(path).await?;
        let removed = data.cache.remove(key).is_some();
        self.write(path, &data).await?;
        Ok(removed)
    }
}
