// Time-boxed cache for slow-changing reference collections, kept in a persistent key-value store

use std::{
    fs,
    future::Future,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::RemoteQueryError,
    schema::{self, Validate},
};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Synchronous string store, keyed by name. Concurrent writers are not
/// coordinated; the last write to a key wins.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read cache entry '{key}'")),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        // Write-then-rename so a reader never sees half an entry
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).with_context(|| format!("Failed to write cache entry '{key}'"))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace cache entry '{key}'"))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("Failed to remove cache entry '{key}'"))
            }
            _ => Ok(()),
        }
    }
}

/// Stored shape of every cache entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: Vec<T>,
    /// Epoch milliseconds at write time.
    pub timestamp: i64,
}

#[derive(Debug, PartialEq)]
pub enum CacheStatus<T> {
    Absent,
    Fresh(Vec<T>),
    Stale,
}

pub struct ReferenceCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl ReferenceCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Reads `key` and classifies it. Unreadable, unparseable or wholly invalid
    /// entries count as absent.
    pub fn inspect<T: Validate>(&self, key: &str, ttl: Duration) -> CacheStatus<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return CacheStatus::Absent,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed; treating as miss");
                return CacheStatus::Absent;
            }
        };

        let entry: CacheEntry<Value> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache entry is corrupted; treating as miss");
                if let Err(e) = self.store.remove(key) {
                    tracing::warn!(key, error = %e, "Failed to evict corrupted cache entry");
                }
                return CacheStatus::Absent;
            }
        };

        // A timestamp ahead of the clock cannot be trusted to be fresh
        let age_ms = self.clock.now().timestamp_millis() - entry.timestamp;
        if age_ms < 0 || age_ms >= i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX) {
            return CacheStatus::Stale;
        }

        let (valid, rejected) = schema::partition::<T>(&entry.data);
        for r in &rejected {
            tracing::warn!(key, index = r.index, reasons = ?r.reasons, "Dropping invalid cached entry");
        }
        if valid.is_empty() && !rejected.is_empty() {
            return CacheStatus::Absent;
        }
        CacheStatus::Fresh(valid)
    }

    /// Serves `key` while it is fresh; otherwise runs `fetch`, keeps the documents
    /// that validate, stores them with a new timestamp and returns them.
    ///
    /// No locking: two callers that both miss will both fetch, last write wins.
    pub async fn get_or_refresh<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<Vec<T>, RemoteQueryError>
    where
        T: Validate + Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Value>, RemoteQueryError>>,
    {
        match self.inspect::<T>(key, ttl) {
            CacheStatus::Fresh(data) => {
                tracing::debug!(key, count = data.len(), "Reference cache hit");
                return Ok(data);
            }
            CacheStatus::Stale => tracing::info!(key, "Reference cache stale; refetching"),
            CacheStatus::Absent => tracing::info!(key, "Reference cache miss; fetching"),
        }

        let documents = fetch().await?;
        let (data, rejected) = schema::partition::<T>(&documents);
        for r in &rejected {
            tracing::warn!(key, index = r.index, reasons = ?r.reasons, "Dropping invalid reference document");
        }

        let entry = CacheEntry { data: data.iter().collect::<Vec<&T>>(), timestamp: self.clock.now().timestamp_millis() };
        match serde_json::to_string(&entry) {
            Ok(serialized) => {
                if let Err(e) = self.store.set(key, &serialized) {
                    tracing::warn!(key, error = %e, "Failed to persist reference cache entry");
                }
            }
            Err(e) => tracing::warn!(key, error = %e, "Failed to serialize reference cache entry"),
        }
        Ok(data)
    }
}
