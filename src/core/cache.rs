use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::error::SniperError;
use crate::core::hash::sha256_hex;

/// One self-contained cache entry. TTL is enforced on read; there is no
/// background sweep.
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    created_at: i64,
    ttl_seconds: u64,
    payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_entries: u64,
    pub expired_entries: u64,
    pub valid_entries: u64,
    pub total_size_bytes: u64,
    pub cache_dir: String,
}

/// File-per-entry cache keyed by namespace plus SHA-256 of the logical key.
/// Layout: `<root>/<namespace>/<hex[0:2]>/<hex>.entry`, written atomically
/// via temp file + rename. Concurrent fetchers of one key are deduplicated
/// through `lock_key` (in-process single-flight).
pub struct Cache {
    root: PathBuf,
    enabled: bool,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Cache {
    pub fn new(root: &Path, enabled: bool) -> Result<Self, SniperError> {
        if enabled {
            fs::create_dir_all(root).map_err(|e| SniperError::CacheIo(e.to_string()))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            enabled,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn entry_path(&self, namespace: &str, key: &str) -> PathBuf {
        let digest = sha256_hex(key.as_bytes());
        self.root
            .join(namespace)
            .join(&digest[..2])
            .join(format!("{digest}.entry"))
    }

    /// Serialize fetches of the same (namespace, key): callers take the
    /// guard, re-check `get`, and only then fetch and `put`. Late arrivals
    /// find the entry on disk instead of issuing a duplicate fetch.
    pub async fn lock_key(&self, namespace: &str, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(format!("{namespace}:{key}"))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }
        let path = self.entry_path(namespace, key);
        if !path.exists() {
            return None;
        }
        let entry = match read_entry(&path) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("cache read error for {namespace}:{key}: {err}");
                let _ = fs::remove_file(&path);
                return None;
            }
        };
        if is_expired(&entry, crate::core::time::now_utc().timestamp()) {
            let _ = fs::remove_file(&path);
            return None;
        }
        match serde_json::from_value(entry.payload) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("cache payload decode error for {namespace}:{key}: {err}");
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    pub fn put<T: Serialize>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), SniperError> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.entry_path(namespace, key);
        let entry = StoredEntry {
            created_at: crate::core::time::now_utc().timestamp(),
            ttl_seconds: ttl.as_secs(),
            payload: serde_json::to_value(value)
                .map_err(|e| SniperError::CacheIo(e.to_string()))?,
        };
        write_entry(&path, &entry).map_err(|e| SniperError::CacheIo(e.to_string()))
    }

    /// Delete every expired entry, returning the number removed.
    pub fn clear_expired(&self) -> Result<u64, SniperError> {
        let now = crate::core::time::now_utc().timestamp();
        let mut removed = 0;
        for path in self.walk_entries()? {
            match read_entry(&path) {
                Ok(entry) if !is_expired(&entry, now) => {}
                _ => {
                    if fs::remove_file(&path).is_ok() {
                        removed += 1;
                    }
                }
            }
        }
        Ok(removed)
    }

    pub fn get_stats(&self) -> Result<CacheStats, SniperError> {
        let now = crate::core::time::now_utc().timestamp();
        let mut stats = CacheStats {
            total_entries: 0,
            expired_entries: 0,
            valid_entries: 0,
            total_size_bytes: 0,
            cache_dir: self.root.to_string_lossy().to_string(),
        };
        for path in self.walk_entries()? {
            stats.total_entries += 1;
            if let Ok(meta) = fs::metadata(&path) {
                stats.total_size_bytes += meta.len();
            }
            match read_entry(&path) {
                Ok(entry) if !is_expired(&entry, now) => stats.valid_entries += 1,
                _ => stats.expired_entries += 1,
            }
        }
        Ok(stats)
    }

    fn walk_entries(&self) -> Result<Vec<PathBuf>, SniperError> {
        let mut out = Vec::new();
        if !self.enabled || !self.root.exists() {
            return Ok(out);
        }
        for namespace in fs::read_dir(&self.root).map_err(|e| SniperError::CacheIo(e.to_string()))?
        {
            let namespace = namespace.map_err(|e| SniperError::CacheIo(e.to_string()))?;
            if !namespace.path().is_dir() {
                continue;
            }
            for shard in
                fs::read_dir(namespace.path()).map_err(|e| SniperError::CacheIo(e.to_string()))?
            {
                let shard = shard.map_err(|e| SniperError::CacheIo(e.to_string()))?;
                if !shard.path().is_dir() {
                    continue;
                }
                for entry in
                    fs::read_dir(shard.path()).map_err(|e| SniperError::CacheIo(e.to_string()))?
                {
                    let entry = entry.map_err(|e| SniperError::CacheIo(e.to_string()))?;
                    let path = entry.path();
                    if path.extension().is_some_and(|ext| ext == "entry") {
                        out.push(path);
                    }
                }
            }
        }
        Ok(out)
    }
}

fn is_expired(entry: &StoredEntry, now: i64) -> bool {
    now > entry.created_at + entry.ttl_seconds as i64
}

fn read_entry(path: &Path) -> Result<StoredEntry, std::io::Error> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(std::io::Error::other)
}

fn write_entry(path: &Path, entry: &StoredEntry) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(entry).map_err(std::io::Error::other)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)
}
