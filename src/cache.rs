//! Durable key to JSON blob store.
//!
//! One pretty-printed `<key>.json` file per logical key. There is no TTL logic
//! here: callers decide whether a blob is fresh enough to use.

use crate::utils::ensure_cache_dir_exists;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Stations,
    Municipalities,
    Currently,
    Hourly,
    Daily,
    Data,
}

impl CacheKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::Stations => "stations",
            CacheKey::Municipalities => "municipalities",
            CacheKey::Currently => "currently",
            CacheKey::Hourly => "hourly",
            CacheKey::Daily => "daily",
            CacheKey::Data => "data",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached section together with the time it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    pub data: T,
    #[serde(rename = "saved")]
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to create cache directory {0}")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to write cache file {0}")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to encode cache entry {0}")]
    Encode(CacheKey, #[source] serde_json::Error),

    #[error("Background cache task failed")]
    TaskJoin(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct JsonCache {
    dir: PathBuf,
}

impl JsonCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the directory if needed before handing out the store.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        ensure_cache_dir_exists(&dir)
            .await
            .map_err(|e| CacheError::DirCreation(dir.clone(), e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Missing or undecodable blobs are absent, never an error.
    pub async fn read(&self, key: CacheKey) -> Option<Value> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                info!("No cached {} at {}: {}", key, path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!("Loaded cached {} from {}", key, path.display());
                Some(value)
            }
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn read_as<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        let value = self.read(key).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!("Cached {} does not have the expected shape: {}", key, e);
                None
            }
        }
    }

    pub async fn write<T: Serialize + ?Sized>(
        &self,
        key: CacheKey,
        value: &T,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| CacheError::Encode(key, e))?;
        let dir = self.dir.clone();
        let path = self.path_for(key);

        tokio::task::spawn_blocking(move || -> Result<(), CacheError> {
            std::fs::create_dir_all(&dir).map_err(|e| CacheError::DirCreation(dir.clone(), e))?;
            let mut file =
                NamedTempFile::new_in(&dir).map_err(|e| CacheError::Write(path.clone(), e))?;
            file.write_all(&bytes)
                .map_err(|e| CacheError::Write(path.clone(), e))?;
            file.persist(&path)
                .map_err(|e| CacheError::Write(path.clone(), e.error))?;
            debug!("Stored {} at {}", key, path.display());
            Ok(())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob {
        name: String,
        value: f64,
    }

    #[tokio::test]
    async fn missing_key_reads_as_absent() -> Result<(), CacheError> {
        let dir = tempdir().map_err(|e| CacheError::DirCreation("tmp".into(), e))?;
        let cache = JsonCache::open(dir.path()).await?;

        assert_eq!(cache.read(CacheKey::Hourly).await, None);
        Ok(())
    }

    #[tokio::test]
    async fn write_then_read_typed() -> Result<(), CacheError> {
        let dir = tempdir().map_err(|e| CacheError::DirCreation("tmp".into(), e))?;
        let cache = JsonCache::open(dir.path().join("nested")).await?;
        let blob = Blob {
            name: "Madrid".into(),
            value: 667.0,
        };

        cache.write(CacheKey::Data, &blob).await?;

        assert!(dir.path().join("nested").join("data.json").exists());
        assert_eq!(cache.read_as::<Blob>(CacheKey::Data).await, Some(blob));
        Ok(())
    }

    #[tokio::test]
    async fn write_replaces_previous_blob() -> Result<(), CacheError> {
        let dir = tempdir().map_err(|e| CacheError::DirCreation("tmp".into(), e))?;
        let cache = JsonCache::open(dir.path()).await?;

        cache.write(CacheKey::Stations, &json!({"saved": 1})).await?;
        cache.write(CacheKey::Stations, &json!({"saved": 2})).await?;

        assert_eq!(
            cache.read(CacheKey::Stations).await,
            Some(json!({"saved": 2}))
        );
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_absent() -> Result<(), CacheError> {
        let dir = tempdir().map_err(|e| CacheError::DirCreation("tmp".into(), e))?;
        let cache = JsonCache::open(dir.path()).await?;
        let path = cache.path_for(CacheKey::Currently);
        std::fs::write(&path, b"{not json").map_err(|e| CacheError::Write(path.clone(), e))?;

        assert_eq!(cache.read(CacheKey::Currently).await, None);
        Ok(())
    }
}
