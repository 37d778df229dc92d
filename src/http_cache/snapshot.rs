//! JSON snapshot persistence for the HTTP cache
//!
//! The snapshot lets a restarted process keep serving cached upstream
//! responses instead of re-fetching every report. Expired entries are
//! skipped both when saving and when loading.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{CacheKey, CachedResponse, HttpCache};
use crate::error::ReportResult;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    key: CacheKey,
    response: CachedResponse,
}

impl HttpCache {
    /// Load a cache from `path`, or start empty if the file does not exist
    pub async fn load_snapshot(path: &Path, ttl: Duration) -> ReportResult<Self> {
        let cache = Self::new(ttl);
        if !tokio::fs::try_exists(path).await? {
            return Ok(cache);
        }

        let bytes = tokio::fs::read(path).await?;
        let entries: Vec<SnapshotEntry> = serde_json::from_slice(&bytes)?;
        for entry in entries {
            cache.insert(entry.key, entry.response);
        }
        let dropped = cache.purge_expired();
        tracing::debug!(
            path = %path.display(),
            loaded = cache.len(),
            dropped,
            "Loaded HTTP cache snapshot"
        );
        Ok(cache)
    }

    /// Write all unexpired entries to `path`, replacing any previous snapshot
    pub async fn save_snapshot(&self, path: &Path) -> ReportResult<()> {
        let entries: Vec<SnapshotEntry> = self
            .fresh_entries()
            .into_iter()
            .map(|(key, response)| SnapshotEntry { key, response })
            .collect();
        let json = serde_json::to_vec(&entries)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write-then-rename so a crash never leaves a truncated snapshot
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        tracing::debug!(path = %path.display(), saved = entries.len(), "Saved HTTP cache snapshot");
        Ok(())
    }
}

/// Serde adapter storing response bodies as base64 strings
pub(crate) mod base64_body {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn response(body: &[u8], age_secs: i64) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: body.to_vec(),
            stored_at: Utc::now() - chrono::Duration::seconds(age_secs),
            from_cache: false,
        }
    }

    #[tokio::test]
    async fn test_snapshot_keeps_fresh_entries_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("http.json");

        let cache = HttpCache::new(Duration::from_secs(60));
        let fresh = CacheKey::new("GET", "https://x/fresh", &[]);
        cache.insert(fresh.clone(), response(b"\x00binary\xff", 0));
        cache.insert(CacheKey::new("GET", "https://x/stale", &[]), response(b"old", 600));
        cache.save_snapshot(&path).await.unwrap();

        let loaded = HttpCache::load_snapshot(&path, Duration::from_secs(60)).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(&fresh).unwrap().body, b"\x00binary\xff");
    }

    #[tokio::test]
    async fn test_missing_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = HttpCache::load_snapshot(&dir.path().join("absent.json"), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(loaded.is_empty());
    }
}
