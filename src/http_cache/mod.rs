//! HTTP-level response cache shared by both report fetchers
//!
//! Responses are keyed by method, URL and a digest of the request headers
//! that affect the response (credentials, media type), so an authorised and
//! an anonymous request for the same URL never share an entry.
//!
//! Entries expire after a fixed TTL. Expired entries are dropped when next
//! read, and by a sweep every few inserts. Invalidation is by URL prefix: the
//! controller clears everything under a report's backend identity when the
//! report's cache token is rotated.
//!
//! The store is a `DashMap`, so concurrent renders read without blocking
//! each other.

pub mod client;
pub mod snapshot;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xxhash_rust::xxh3::xxh3_64;

pub use client::{CachingClient, HttpRequest};

/// Identity of a cacheable request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
    /// xxh3 digest of the sorted request headers
    pub header_digest: u64,
}

impl CacheKey {
    /// Build a key from a request's parts.
    ///
    /// Header names are compared case-insensitively and order does not matter.
    #[must_use]
    pub fn new(method: &str, url: &str, headers: &[(String, String)]) -> Self {
        let mut normalized: Vec<(String, &str)> = headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.as_str()))
            .collect();
        normalized.sort();

        let mut material = String::new();
        for (name, value) in normalized {
            material.push_str(&name);
            material.push(':');
            material.push_str(value);
            material.push('\n');
        }

        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            header_digest: xxh3_64(material.as_bytes()),
        }
    }
}

/// A stored upstream response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    /// Response headers with lowercase names
    pub headers: BTreeMap<String, String>,
    #[serde(with = "snapshot::base64_body")]
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
    /// Set when this value was served from the cache rather than the network
    #[serde(skip)]
    pub from_cache: bool,
}

impl CachedResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Inserts between sweeps for expired entries that are never requested again
const PURGE_INTERVAL: usize = 64;

/// Keyed response store with TTL expiry
#[derive(Debug)]
pub struct HttpCache {
    entries: DashMap<CacheKey, CachedResponse>,
    ttl: Duration,
    inserts: AtomicUsize,
}

impl HttpCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            inserts: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, response: &CachedResponse, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(response.stored_at);
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => age >= ttl,
            // TTL too large to represent: never expires
            Err(_) => false,
        }
    }

    /// Fresh entry for `key`, evicting it if it has expired
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        let now = Utc::now();
        {
            let entry = self.entries.get(key)?;
            if !self.is_expired(entry.value(), now) {
                let mut response = entry.value().clone();
                response.from_cache = true;
                return Some(response);
            }
        }
        // Read guard must be dropped first: removing while holding it deadlocks the shard
        self.evict_expired(key, now);
        None
    }

    /// Remove `key` only if the entry stored now is still expired, so a
    /// response inserted since the caller's read survives
    fn evict_expired(&self, key: &CacheKey, now: DateTime<Utc>) -> bool {
        let evicted = self
            .entries
            .remove_if(key, |_, response| self.is_expired(response, now))
            .is_some();
        if evicted {
            tracing::debug!(url = %key.url, "Evicted expired HTTP cache entry");
        }
        evicted
    }

    /// Store `response`, sweeping expired entries every `PURGE_INTERVAL` inserts
    pub fn insert(&self, key: CacheKey, mut response: CachedResponse) {
        response.from_cache = false;
        self.entries.insert(key, response);
        if (self.inserts.fetch_add(1, Ordering::Relaxed) + 1) % PURGE_INTERVAL == 0 {
            let purged = self.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Swept expired HTTP cache entries");
            }
        }
    }

    /// Remove every entry whose URL starts with `url_prefix`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_prefix(&self, url_prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.url.starts_with(url_prefix));
        let removed = before.saturating_sub(self.entries.len());
        tracing::debug!(url_prefix, removed, "Invalidated HTTP cache entries");
        removed
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, response| !self.is_expired(response, now));
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies of all unexpired entries
    #[must_use]
    pub fn fresh_entries(&self) -> Vec<(CacheKey, CachedResponse)> {
        let now = Utc::now();
        self.entries
            .iter()
            .filter(|entry| !self.is_expired(entry.value(), now))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
