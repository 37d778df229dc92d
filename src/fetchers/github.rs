//! GitHub-hosted report files
//!
//! The primary path asks the contents endpoint for the file itself. GitHub
//! only inlines files up to 1MB there; larger files come back without content
//! (or as a `too_large` error), in which case the file is located in its
//! parent folder listing and fetched as a git blob by SHA instead.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use url::Url;

use super::{ContentFetcher, FetchedContent, SourceLocation, parse_last_modified};
use crate::config::GatewayConfig;
use crate::error::{NotFound, ReportError, ReportResult};
use crate::http_cache::{CachedResponse, CachingClient, HttpRequest};
use crate::utils::GITHUB_ACCEPT;

/// Repository metadata returned by `GET /repos/{owner}/{repo}`
#[derive(Debug, Clone, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// One entry of a contents folder listing
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: u64,
}

/// Single-file response of the contents endpoint
#[derive(Debug, Deserialize)]
struct ContentFile {
    #[serde(default)]
    size: u64,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitBlob {
    content: String,
    encoding: String,
}

/// Folder listing plus the response metadata needed for staleness tracking
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    pub entries: Vec<ContentEntry>,
    pub last_modified: Option<String>,
    pub from_cache: bool,
}

enum ContentsOutcome {
    File(FetchedContent),
    TooLarge,
}

/// Client for the GitHub REST API scoped to one organisation
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: CachingClient,
    api_url: Url,
    organisation: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(
        http: CachingClient,
        api_url: &str,
        organisation: impl Into<String>,
        token: Option<String>,
    ) -> ReportResult<Self> {
        let api_url = Url::parse(api_url)?;
        if api_url.cannot_be_a_base() {
            return Err(ReportError::Config(format!("GitHub API URL '{api_url}' cannot be a base")));
        }
        Ok(Self {
            http,
            api_url,
            organisation: organisation.into(),
            token,
        })
    }

    pub fn from_config(config: &GatewayConfig, http: CachingClient) -> ReportResult<Self> {
        Self::new(
            http,
            config.github_api_url(),
            config.github_organisation(),
            config.github_token().map(str::to_string),
        )
    }

    #[must_use]
    pub fn http(&self) -> &CachingClient {
        &self.http
    }

    /// API URL built from path segments; slashes inside a segment split it further
    fn endpoint(&self, segments: &[&str]) -> ReportResult<Url> {
        let mut url = self.api_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ReportError::Config(format!("GitHub API URL '{}' cannot be a base", self.api_url)))?;
            path.pop_if_empty();
            for part in segments.iter().flat_map(|s| s.split('/')).filter(|p| !p.is_empty()) {
                path.push(part);
            }
        }
        Ok(url)
    }

    /// `/repos/{org}/{repo}`; names are lowercased so lookups are case-insensitive
    pub fn repo_url(&self, repo: &str) -> ReportResult<Url> {
        let repo = repo.trim().to_lowercase();
        self.endpoint(&["repos", &self.organisation, &repo])
    }

    /// Prefix covering every cached request made for `repo`
    pub fn cache_prefix(&self, repo: &str) -> ReportResult<String> {
        Ok(format!("{}/", self.repo_url(repo)?))
    }

    fn request(&self, url: &Url) -> HttpRequest {
        let request = HttpRequest::get(url.as_str()).header("Accept", GITHUB_ACCEPT);
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    async fn send(&self, url: &Url, use_cache: bool) -> ReportResult<CachedResponse> {
        self.http.execute(&self.request(url), use_cache).await
    }

    /// Look up a repository in the organisation
    pub async fn get_repo(&self, repo: &str, use_cache: bool) -> ReportResult<RepoInfo> {
        let url = self.repo_url(repo)?;
        let response = self.send(&url, use_cache).await?;
        match response.status {
            404 => Err(ReportError::NotFound(NotFound::Repo(repo.to_string()))),
            _ if response.is_success() => Ok(serde_json::from_slice(&response.body)?),
            status => Err(ReportError::UpstreamStatus {
                status,
                url: url.to_string(),
            }),
        }
    }
}

fn decode_base64(content: &str) -> ReportResult<Vec<u8>> {
    // GitHub wraps base64 payloads at 60 columns
    let compact: String = content.split_ascii_whitespace().collect();
    Ok(STANDARD.decode(compact)?)
}

/// A report file in a GitHub repository
#[derive(Debug, Clone)]
pub struct GithubReport<'a> {
    client: &'a GithubClient,
    location: SourceLocation,
    use_git_blob: bool,
    use_cache: bool,
}

impl<'a> GithubReport<'a> {
    /// `use_git_blob` skips the contents call when it is known to fail for this file
    #[must_use]
    pub fn new(client: &'a GithubClient, location: SourceLocation, use_git_blob: bool) -> Self {
        Self {
            client,
            location,
            use_git_blob,
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
    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    fn not_found(&self, path: String) -> ReportError {
        ReportError::NotFound(NotFound::Path {
            path,
            branch: self.location.branch.clone(),
        })
    }

    fn contents_url(&self, path: &str) -> ReportResult<Url> {
        let repo = self.location.repo.trim().to_lowercase();
        let mut url = self
            .client
            .endpoint(&["repos", &self.client.organisation, &repo, "contents", path])?;
        url.query_pairs_mut().append_pair("ref", &self.location.branch);
        Ok(url)
    }

    pub async fn repo(&self) -> ReportResult<RepoInfo> {
        self.client.get_repo(&self.location.repo, self.use_cache).await
    }

    /// List the folder that should contain the report file.
    ///
    /// Fails with `NotFound` if the branch or the folder does not exist.
    pub async fn get_parent_contents(&self) -> ReportResult<DirectoryListing> {
        let parent = self.location.parent_path();
        let url = self.contents_url(&parent)?;
        let response = self.client.send(&url, self.use_cache).await?;

        if response.status == 404 {
            return Err(self.not_found(parent));
        }
        if !response.is_success() {
            return Err(ReportError::UpstreamStatus {
                status: response.status,
                url: url.to_string(),
            });
        }

        let entries: Vec<ContentEntry> = serde_json::from_slice(&response.body).map_err(|e| {
            ReportError::InvalidPayload(format!("'{parent}' is not a folder listing: {e}"))
        })?;
        Ok(DirectoryListing {
            entries,
            last_modified: response.header("last-modified").map(str::to_string),
            from_cache: response.from_cache,
        })
    }

    /// Entry in `listing` whose name matches the report file's base name
    #[must_use]
    pub fn matching_report_file<'l>(&self, listing: &'l DirectoryListing) -> Option<&'l ContentEntry> {
        let file_name = self.location.file_name();
        listing.entries.iter().find(|entry| entry.name == file_name)
    }

    async fn get_contents(&self) -> ReportResult<ContentsOutcome> {
        let url = self.contents_url(&self.location.path)?;
        let response = self.client.send(&url, self.use_cache).await?;

        match response.status {
            404 => return Err(self.not_found(self.location.path.clone())),
            403 if String::from_utf8_lossy(&response.body).contains("too_large") => {
                return Ok(ContentsOutcome::TooLarge);
            }
            _ if !response.is_success() => {
                return Err(ReportError::UpstreamStatus {
                    status: response.status,
                    url: url.to_string(),
                });
            }
            _ => {}
        }

        let file: ContentFile = serde_json::from_slice(&response.body).map_err(|e| {
            ReportError::InvalidPayload(format!("'{}' is not a file: {e}", self.location.path))
        })?;
        let content = file.content.unwrap_or_default();
        let inline_missing = file.encoding.as_deref() == Some("none")
            || (content.trim().is_empty() && file.size > 0);
        if inline_missing {
            return Ok(ContentsOutcome::TooLarge);
        }

        Ok(ContentsOutcome::File(FetchedContent {
            body: decode_base64(&content)?,
            last_modified: parse_last_modified(response.header("last-modified"))?,
            from_cache: response.from_cache,
            used_git_blob: false,
        }))
    }

    /// Fetch the file as a git blob found through its parent folder listing
    pub async fn get_contents_from_git_blob(&self) -> ReportResult<FetchedContent> {
        let listing = self.get_parent_contents().await?;
        let entry = self
            .matching_report_file(&listing)
            .ok_or_else(|| self.not_found(self.location.path.clone()))?;

        let repo = self.location.repo.trim().to_lowercase();
        let url = self
            .client
            .endpoint(&["repos", &self.client.organisation, &repo, "git", "blobs", &entry.sha])?;
        let response = self.client.send(&url, self.use_cache).await?;
        if !response.is_success() {
            return Err(ReportError::UpstreamStatus {
                status: response.status,
                url: url.to_string(),
            });
        }

        let blob: GitBlob = serde_json::from_slice(&response.body)?;
        let body = match blob.encoding.as_str() {
            "base64" => decode_base64(&blob.content)?,
            "utf-8" | "utf8" => blob.content.into_bytes(),
            other => {
                return Err(ReportError::InvalidPayload(format!(
                    "Unsupported blob encoding '{other}'"
                )));
            }
        };

        Ok(FetchedContent {
            body,
            last_modified: parse_last_modified(listing.last_modified.as_deref())?,
            from_cache: listing.from_cache && response.from_cache,
            used_git_blob: true,
        })
    }
}

impl ContentFetcher for GithubReport<'_> {
    async fn probe_exists(&self) -> ReportResult<bool> {
        match self.get_parent_contents().await {
            Ok(listing) => Ok(self.matching_report_file(&listing).is_some()),
            Err(ReportError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn fetch(&self) -> ReportResult<FetchedContent> {
        if self.use_git_blob {
            return self.get_contents_from_git_blob().await;
        }
        match self.get_contents().await? {
            ContentsOutcome::File(content) => Ok(content),
            ContentsOutcome::TooLarge => {
                tracing::debug!(
                    repo = %self.location.repo,
                    path = %self.location.path,
                    "File too large for contents endpoint, using git blob"
                );
                self.get_contents_from_git_blob().await
            }
        }
    }
}
