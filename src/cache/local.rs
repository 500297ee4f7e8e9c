//! Durable TTL cache backed by a directory of JSON records.
//!
//! Each key is stored as `<dir>/<prefix><escaped key>.json` holding
//! `{"data": ..., "timestamp": <unix ms>, "ttl": <ms>}`. Timestamps are
//! wall-clock so records stay meaningful across restarts.
//!
//! There is no locking between processes; the last writer wins.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::telemetry;

/// Default key prefix for cache records.
pub const DEFAULT_PREFIX: &str = "smartspend_cache_";

#[derive(Serialize)]
struct RecordRef<'a, T> {
    data: &'a T,
    timestamp: u64,
    ttl: u64,
}

#[derive(Deserialize)]
struct Record<T> {
    data: T,
    timestamp: u64,
    ttl: u64,
}

impl<T> Record<T> {
    fn is_fresh(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp) < self.ttl
    }
}

/// Durable key/value cache with per-entry TTL.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
    prefix: String,
}

impl LocalCache {
    /// Cache rooted at `dir` using [`DEFAULT_PREFIX`].
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_prefix(dir, DEFAULT_PREFIX)
    }

    pub fn with_prefix(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Default cache directory: `~/.cache/smartspend`.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("smartspend")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}.json", self.prefix, escape_key(key)))
    }

    /// Persist `data` under `key`. Storage failures are logged, not raised.
    pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) {
        let record = RecordRef {
            data,
            timestamp: now_millis(),
            ttl: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        };
        if let Err(e) = self.write_record(key, &record) {
            warn!(key, error = %e, "failed to persist cache record");
        }
    }

    fn write_record<T: Serialize>(
        &self,
        key: &str,
        record: &RecordRef<'_, T>,
    ) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec(record).map_err(std::io::Error::other)?;
        let path = self.path_for(key);
        // Write to tmp file first, then rename for atomicity
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &path)
    }

    /// Fresh value for `key`.
    ///
    /// Missing, expired, unreadable and corrupt records all read as `None`;
    /// expired and corrupt records are deleted.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.read_record::<T>(key).map(|record| record.data);
        if value.is_some() {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => "local").increment(1);
        } else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => "local").increment(1);
        }
        value
    }

    fn read_record<T: DeserializeOwned>(&self, key: &str) -> Option<Record<T>> {
        let path = self.path_for(key);
        let content = match std::fs::read(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cache record");
                return None;
            }
        };
        let record: Record<T> = match serde_json::from_slice(&content) {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache record, removing");
                self.remove_file(&path);
                return None;
            }
        };
        if record.is_fresh(now_millis()) {
            Some(record)
        } else {
            debug!(key, "cache record expired");
            self.remove_file(&path);
            None
        }
    }

    /// Whether `key` holds a fresh, well-formed record.
    pub fn has(&self, key: &str) -> bool {
        self.read_record::<serde_json::Value>(key).is_some()
    }

    pub fn delete(&self, key: &str) {
        self.remove_file(&self.path_for(key));
    }

    /// Remove every record carrying this cache's prefix.
    pub fn clear(&self) {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "failed to list cache directory");
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&self.prefix) && name.ends_with(".json") {
                self.remove_file(&entry.path());
            }
        }
    }

    fn remove_file(&self, path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove cache record"),
        }
    }
}

/// Milliseconds since the unix epoch (0 if the clock is before it).
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Make a key safe for use in a file name.
///
/// ASCII alphanumerics, `-`, `_` and `.` pass through; every other byte
/// becomes `%XX`.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
