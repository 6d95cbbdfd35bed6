//! Durable cost center lookup cache.
//!
//! A name -> id table persisted as versioned JSON under the cache directory.
//! Entries expire individually; expiry is checked on read and only removed
//! by [`CostCenterCache::cleanup_expired`].

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_TTL_HOURS: u32 = 24;
pub const CACHE_FILE_NAME: &str = "cost_centers.json";
const CACHE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error
    },

    #[error("Failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error
    },

    #[error("Failed to remove cache file {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error
    },

    #[error("Failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: String,
    pub name: String,
    pub cached_at: DateTime<Utc>,
    pub ttl_hours: u32
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now - self.cached_at > Duration::hours(i64::from(self.ttl_hours))
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    #[serde(default)]
    entries: HashMap<String, CacheEntry>
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: HashMap::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    pub file_path: PathBuf,
    pub size_bytes: u64
}

pub struct CostCenterCache {
    file_path: PathBuf,
    ttl_hours: u32,
    data: Mutex<CacheFile>
}

impl CostCenterCache {
    /// Open the cache stored in `dir`.
    ///
    /// A missing, unreadable or corrupt file yields an empty cache. A file
    /// written by another format version is discarded entirely.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let file_path = dir.as_ref().join(CACHE_FILE_NAME);
        let data = Self::load(&file_path);
        Self {
            file_path,
            ttl_hours: DEFAULT_TTL_HOURS,
            data: Mutex::new(data)
        }
    }

    pub fn with_ttl_hours(mut self, ttl_hours: u32) -> Self {
        self.ttl_hours = ttl_hours;
        self
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn load(path: &Path) -> CacheFile {
        let contents = match std::fs::read(path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No existing cache file, starting fresh");
                return CacheFile::default();
            }
        };

        let file: CacheFile = match serde_json::from_slice(&contents) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt cache file, starting fresh");
                return CacheFile::default();
            }
        };

        if file.version != CACHE_VERSION {
            warn!(
                expected = CACHE_VERSION,
                found = file.version,
                "Cache version mismatch, starting fresh"
            );
            return CacheFile::default();
        }

        debug!(entries = file.entries.len(), path = %path.display(), "Cache loaded");
        file
    }

    fn save(&self, data: &CacheFile) -> Result<(), CacheError> {
        if let Some(dir) = self.file_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|source| CacheError::CreateDir {
                    path: dir.to_path_buf(),
                    source
                })?;
            }
        }

        let json = serde_json::to_vec_pretty(data)?;
        std::fs::write(&self.file_path, json).map_err(|source| CacheError::Write {
            path: self.file_path.clone(),
            source
        })?;

        debug!(entries = data.entries.len(), path = %self.file_path.display(), "Cache saved");
        Ok(())
    }

    /// Returns the entry for `key` if present and not expired.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let data = self.data.lock();
        let entry = data.entries.get(key)?;
        if entry.is_expired() {
            debug!(key, "Cache entry expired");
            return None;
        }
        debug!(key, id = %entry.id, "Cache hit");
        Some(entry.clone())
    }

    /// Store an entry and flush the whole table to disk.
    ///
    /// The in-memory entry is kept even when the write fails.
    pub fn set(&self, key: &str, id: &str, name: &str) -> Result<(), CacheError> {
        let mut data = self.data.lock();
        data.entries.insert(
            key.to_string(),
            CacheEntry {
                id: id.to_string(),
                name: name.to_string(),
                cached_at: Utc::now(),
                ttl_hours: self.ttl_hours
            }
        );
        debug!(key, id, "Cache set");
        self.save(&data)
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        let mut data = self.data.lock();
        data.entries.clear();
        info!("Cache cleared");

        match std::fs::remove_file(&self.file_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Remove {
                path: self.file_path.clone(),
                source
            })
        }
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> Result<usize, CacheError> {
        let mut data = self.data.lock();
        let now = Utc::now();
        let before = data.entries.len();
        data.entries.retain(|key, entry| {
            let keep = !entry.is_expired_at(now);
            if !keep {
                debug!(key = %key, "Removed expired entry");
            }
            keep
        });
        let removed = before - data.entries.len();

        if removed > 0 {
            self.save(&data)?;
        }

        info!(removed, remaining = data.entries.len(), "Cache cleanup complete");
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        let data = self.data.lock();
        let now = Utc::now();
        let expired = data
            .entries
            .values()
            .filter(|e| e.is_expired_at(now))
            .count();
        let size_bytes = std::fs::metadata(&self.file_path)
            .map(|m| m.len())
            .unwrap_or(0);

        CacheStats {
            total: data.entries.len(),
            valid: data.entries.len() - expired,
            expired,
            file_path: self.file_path.clone(),
            size_bytes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_cache_file(dir: &Path, version: u32, entries: &[(&str, &str, DateTime<Utc>)]) {
        let entries: HashMap<String, CacheEntry> = entries
            .iter()
            .map(|(key, id, cached_at)| {
                (
                    key.to_string(),
                    CacheEntry {
                        id: id.to_string(),
                        name: key.to_string(),
                        cached_at: *cached_at,
                        ttl_hours: DEFAULT_TTL_HOURS
                    }
                )
            })
            .collect();
        let file = CacheFile { version, entries };
        std::fs::write(
            dir.join(CACHE_FILE_NAME),
            serde_json::to_vec(&file).unwrap()
        )
        .unwrap();
    }

    #[test]
    fn test_set_then_get_within_ttl() {
        let dir = TempDir::new().unwrap();
        let cache = CostCenterCache::new(dir.path());

        cache.set("Name-X", "id-X", "Name-X").unwrap();
        let entry = cache.get("Name-X").unwrap();
        assert_eq!(entry.id, "id-X");
        assert_eq!(entry.name, "Name-X");
        assert!(dir.path().join(CACHE_FILE_NAME).exists());
    }

    #[test]
    fn test_stale_entry_is_not_returned() {
        let dir = TempDir::new().unwrap();
        let stale = Utc::now() - Duration::hours(25);
        write_cache_file(dir.path(), CACHE_VERSION, &[("Name-X", "id-X", stale)]);

        let cache = CostCenterCache::new(dir.path());
        assert!(cache.get("Name-X").is_none());
        // Expiry is a read-time check only.
        assert_eq!(cache.stats().total, 1);
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let entry = CacheEntry {
            id: "id".to_string(),
            name: "n".to_string(),
            cached_at: now - Duration::hours(24),
            ttl_hours: 24
        };
        assert!(!entry.is_expired_at(now));
        assert!(entry.is_expired_at(now + Duration::seconds(1)));
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let cache = CostCenterCache::new(dir.path());
            cache.set("Platform", "uuid-1", "Platform").unwrap();
        }
        let reopened = CostCenterCache::new(dir.path());
        assert_eq!(reopened.get("Platform").unwrap().id, "uuid-1");
    }

    #[test]
    fn test_version_mismatch_discards_entries() {
        let dir = TempDir::new().unwrap();
        write_cache_file(dir.path(), 2, &[("Platform", "uuid-1", Utc::now())]);

        let cache = CostCenterCache::new(dir.path());
        assert!(cache.get("Platform").is_none());
        assert_eq!(cache.stats().total, 0);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CACHE_FILE_NAME), "{not json").unwrap();

        let cache = CostCenterCache::new(dir.path());
        assert_eq!(cache.stats().total, 0);
    }

    #[test]
    fn test_cleanup_expired() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();
        write_cache_file(
            dir.path(),
            CACHE_VERSION,
            &[
                ("old", "id-1", now - Duration::hours(48)),
                ("fresh", "id-2", now)
            ]
        );

        let cache = CostCenterCache::new(dir.path());
        assert_eq!(cache.cleanup_expired().unwrap(), 1);
        let stats = cache.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.valid, 1);
        assert!(cache.get("fresh").is_some());
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let cache = CostCenterCache::new(dir.path());
        cache.set("a", "1", "a").unwrap();

        cache.clear().unwrap();
        assert!(!dir.path().join(CACHE_FILE_NAME).exists());
        assert_eq!(cache.stats().total, 0);
        // Clearing twice is fine.
        cache.clear().unwrap();
    }

    #[test]
    fn test_write_failure_keeps_memory_state() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let cache = CostCenterCache::new(blocker.join("cache"));
        assert!(cache.set("Platform", "uuid-1", "Platform").is_err());
        assert_eq!(cache.get("Platform").unwrap().id, "uuid-1");
    }

    #[test]
    fn test_custom_ttl_is_recorded() {
        let dir = TempDir::new().unwrap();
        let cache = CostCenterCache::new(dir.path()).with_ttl_hours(2);
        cache.set("a", "1", "a").unwrap();
        assert_eq!(cache.get("a").unwrap().ttl_hours, 2);
    }
}
