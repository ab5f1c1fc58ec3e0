//! Durable key → JSON blob cache shared between pollers and the HTTP server.
//!
//! Writers replace a whole entry at a time: readers clone an `Arc<CacheEntry>` out of
//! the index, so they see either the previous entry or the new one, never a mix.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::CacheEntry;
use crate::util::{now_ms, system_time_ms};

const BLOB_EXT: &str = "json";

/// Errors surfaced by [`CacheStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing has been stored under this key yet.
    #[error("no cached value for {0}")]
    NotFound(String),
    /// Key cannot be mapped to a storage location.
    #[error("invalid cache key: {0:?}")]
    InvalidKey(String),
    /// Filesystem failure while persisting or loading.
    #[error("cache io error at {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A writer panicked while holding the index lock.
    #[error("cache index lock poisoned")]
    Poisoned,
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True for a cache miss, as opposed to a storage failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Key → blob store with atomic whole-value replacement.
pub trait CacheStore: Send + Sync {
    /// Replaces the value for `key`. Returns once the value is persisted.
    fn put(&self, key: &str, payload: Vec<u8>) -> Result<Arc<CacheEntry>, StoreError>;

    /// Current value for `key`, or [`StoreError::NotFound`] if never populated.
    fn get(&self, key: &str) -> Result<Arc<CacheEntry>, StoreError>;
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

type Index = RwLock<HashMap<String, Arc<CacheEntry>>>;

fn read_index(index: &Index, key: &str) -> Result<Arc<CacheEntry>, StoreError> {
    let guard = index.read().map_err(|_| StoreError::Poisoned)?;
    guard
        .get(key)
        .cloned()
        .ok_or_else(|| StoreError::NotFound(key.to_string()))
}

fn swap_index(index: &Index, key: &str, entry: Arc<CacheEntry>) -> Result<(), StoreError> {
    let mut guard = index.write().map_err(|_| StoreError::Poisoned)?;
    guard.insert(key.to_string(), entry);
    Ok(())
}

/// In-memory store for tests. Not durable.
#[derive(Default)]
pub struct MemoryCacheStore {
    index: Index,
}

impl MemoryCacheStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn put(&self, key: &str, payload: Vec<u8>) -> Result<Arc<CacheEntry>, StoreError> {
        validate_key(key)?;
        let entry = Arc::new(CacheEntry {
            payload: Bytes::from(payload),
            fetched_at_ms: now_ms(),
        });
        swap_index(&self.index, key, Arc::clone(&entry))?;
        Ok(entry)
    }

    fn get(&self, key: &str) -> Result<Arc<CacheEntry>, StoreError> {
        read_index(&self.index, key)
    }
}

/// File-backed store: one `<key>.json` per entry in `dir`.
///
/// `put` writes a hidden temp file, fsyncs it and renames it over the target, so the
/// on-disk file is always a complete earlier or later body. Entries found in `dir`
/// at open time are served immediately, stamped with their file mtime.
pub struct FsCacheStore {
    dir: PathBuf,
    index: Index,
}

impl FsCacheStore {
    /// Opens (creating if needed) a cache directory and loads its entries.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let mut entries = HashMap::new();
        let listing = fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;
        for item in listing {
            let item = item.map_err(|e| StoreError::io(&dir, e))?;
            let path = item.path();
            let Some(key) = blob_key(&path) else { continue };

            let payload = match fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable cache file");
                    continue;
                }
            };
            let fetched_at_ms = item
                .metadata()
                .and_then(|m| m.modified())
                .map(system_time_ms)
                .unwrap_or_else(|_| now_ms());

            debug!(key = %key, bytes = payload.len(), "loaded cached entry");
            entries.insert(
                key,
                Arc::new(CacheEntry {
                    payload: Bytes::from(payload),
                    fetched_at_ms,
                }),
            );
        }

        info!(dir = %dir.display(), entries = entries.len(), "cache opened");
        Ok(Self {
            dir,
            index: RwLock::new(entries),
        })
    }

    /// Backing directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{BLOB_EXT}"))
    }

    fn write_atomic(&self, key: &str, payload: &[u8]) -> Result<(), StoreError> {
        let target = self.blob_path(key);
        let tmp = self.dir.join(format!(".{key}.{BLOB_EXT}.tmp"));

        let mut f = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        f.write_all(payload).map_err(|e| StoreError::io(&tmp, e))?;
        f.sync_all().map_err(|e| StoreError::io(&tmp, e))?;
        drop(f);

        fs::rename(&tmp, &target).map_err(|e| StoreError::io(&target, e))?;

        // Best effort: make the rename itself durable. Not supported everywhere.
        if let Ok(d) = File::open(&self.dir) {
            let _ = d.sync_all();
        }
        Ok(())
    }
}

impl CacheStore for FsCacheStore {
    fn put(&self, key: &str, payload: Vec<u8>) -> Result<Arc<CacheEntry>, StoreError> {
        validate_key(key)?;
        self.write_atomic(key, &payload)?;
        let entry = Arc::new(CacheEntry {
            payload: Bytes::from(payload),
            fetched_at_ms: now_ms(),
        });
        swap_index(&self.index, key, Arc::clone(&entry))?;
        Ok(entry)
    }

    fn get(&self, key: &str) -> Result<Arc<CacheEntry>, StoreError> {
        read_index(&self.index, key)
    }
}

/// Key for a `<key>.json` cache file; `None` for temp files and anything else.
fn blob_key(path: &Path) -> Option<String> {
    if path.extension()?.to_str()? != BLOB_EXT {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    validate_key(stem).ok()?;
    Some(stem.to_string())
}
