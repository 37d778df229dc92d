//! reqwest client wrapped with the shared response cache

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Method};

use super::{CacheKey, CachedResponse, HttpCache};
use crate::error::ReportResult;
use crate::utils::USER_AGENT;

/// Request description used both to send and to key the cache
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn head(url: impl Into<String>) -> Self {
        Self {
            method: Method::HEAD,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.method.as_str(), &self.url, &self.headers)
    }
}

/// HTTP client whose successful responses go through an [`HttpCache`].
///
/// Cheap to clone; clones share the connection pool and the cache.
#[derive(Debug, Clone)]
pub struct CachingClient {
    client: Client,
    cache: Arc<HttpCache>,
}

impl CachingClient {
    /// Client with the given per-request timeout
    pub fn new(timeout: Duration, cache: Arc<HttpCache>) -> ReportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, cache })
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<HttpCache> {
        &self.cache
    }

    /// Send `request`, consulting the cache first when `use_cache` is set.
    ///
    /// Only 2xx responses are stored. With `use_cache == false` the cache is
    /// neither read nor written.
    pub async fn execute(&self, request: &HttpRequest, use_cache: bool) -> ReportResult<CachedResponse> {
        let key = request.cache_key();
        if use_cache && let Some(hit) = self.cache.get(&key) {
            tracing::debug!(method = %request.method, url = %request.url, "Served from HTTP cache");
            return Ok(hit);
        }

        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        let fetched = CachedResponse {
            status,
            headers,
            body,
            stored_at: Utc::now(),
            from_cache: false,
        };

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status,
            "Fetched from upstream"
        );

        if use_cache && fetched.is_success() {
            self.cache.insert(key, fetched.clone());
        }
        Ok(fetched)
    }
}
