//! Job-server hosted report files
//!
//! Published outputs are public; anything else needs the job-server token in
//! the `Authorization` header. Every fetch is preceded by a `HEAD` probe so a
//! missing file fails fast without transferring a body.

use url::Url;

use super::{ContentFetcher, FetchedContent, parse_last_modified};
use crate::config::GatewayConfig;
use crate::error::{NotFound, ReportError, ReportResult};
use crate::http_cache::{CachedResponse, CachingClient, HttpRequest};

/// Client for job-server release files
#[derive(Debug, Clone)]
pub struct JobServerClient {
    http: CachingClient,
    token: Option<String>,
}

impl JobServerClient {
    #[must_use]
    pub fn new(http: CachingClient, token: Option<String>) -> Self {
        Self { http, token }
    }

    #[must_use]
    pub fn from_config(config: &GatewayConfig, http: CachingClient) -> Self {
        Self::new(http, config.job_server_token().map(str::to_string))
    }

    #[must_use]
    pub fn http(&self) -> &CachingClient {
        &self.http
    }

    /// Published outputs live under a `published` path segment
    #[must_use]
    pub fn is_published(url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.path_segments().map(|mut s| s.any(|seg| seg == "published")))
            .unwrap_or(false)
    }

    fn authorize(&self, request: HttpRequest) -> HttpRequest {
        if Self::is_published(&request.url) {
            return request;
        }
        match &self.token {
            Some(token) => request.header("Authorization", token.clone()),
            None => {
                tracing::debug!(url = %request.url, "No job-server token configured for unpublished file");
                request
            }
        }
    }

    async fn head(&self, url: &str, use_cache: bool) -> ReportResult<CachedResponse> {
        let request = self.authorize(HttpRequest::head(url));
        self.http.execute(&request, use_cache).await
    }

    /// `HEAD` the file; any non-2xx answer means it is not available
    pub async fn file_exists(&self, url: &str, use_cache: bool) -> ReportResult<bool> {
        Ok(self.head(url, use_cache).await?.is_success())
    }

    /// `GET` the file, failing on any non-2xx answer
    pub async fn get_file(&self, url: &str, use_cache: bool) -> ReportResult<CachedResponse> {
        let request = self.authorize(HttpRequest::get(url));
        let response = self.http.execute(&request, use_cache).await?;
        if !response.is_success() {
            return Err(ReportError::UpstreamStatus {
                status: response.status,
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

/// A report file served by job-server
#[derive(Debug, Clone)]
pub struct JobServerReport<'a> {
    client: &'a JobServerClient,
    url: String,
    use_cache: bool,
}

impl<'a> JobServerReport<'a> {
    #[must_use]
    pub fn new(client: &'a JobServerClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            use_cache: true,
        }
    }

    /// Bypass the HTTP cache for every request (used by validation)
    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ContentFetcher for JobServerReport<'_> {
    async fn probe_exists(&self) -> ReportResult<bool> {
        self.client.file_exists(&self.url, self.use_cache).await
    }

    async fn fetch(&self) -> ReportResult<FetchedContent> {
        let probe = self.client.head(&self.url, self.use_cache).await?;
        if !probe.is_success() {
            return Err(ReportError::NotFound(NotFound::Url(self.url.clone())));
        }

        let response = self.client.get_file(&self.url, self.use_cache).await?;
        let last_modified = parse_last_modified(response.header("last-modified"))?;
        Ok(FetchedContent {
            from_cache: probe.from_cache && response.from_cache,
            last_modified,
            body: response.body,
            used_git_blob: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_published_detection() {
        assert!(JobServerClient::is_published(
            "https://jobs.opensafely.org/org/project/workspace/published/file_id"
        ));
        assert!(!JobServerClient::is_published(
            "https://jobs.opensafely.org/api/v2/releases/file/file_id"
        ));
        assert!(!JobServerClient::is_published(
            "https://jobs.opensafely.org/unpublished-things/file_id"
        ));
        assert!(!JobServerClient::is_published("not a url"));
    }
}
