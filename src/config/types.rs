//! Core configuration types for the report gateway

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration struct for fetching, caching and validating reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Optional bearer token for the GitHub API.
    ///
    /// Unauthenticated requests work for public repositories but share a
    /// much lower rate limit.
    #[serde(skip_serializing)]
    pub(crate) github_token: Option<String>,

    /// Base URL of the GitHub REST API (overridden in tests)
    pub(crate) github_api_url: String,

    /// Organisation every report repository lives under
    pub(crate) github_organisation: String,

    /// Branch assumed when a report leaves it blank
    pub(crate) default_branch: String,

    /// Token sent to job-server for unpublished outputs
    #[serde(skip_serializing)]
    pub(crate) job_server_token: Option<String>,

    /// Skip the repo/branch/file and job-server existence checks on save.
    ///
    /// Offline checks (filename, backend selection) still run.
    pub(crate) skip_network_validation: bool,

    pub(crate) http_cache: HttpCacheConfig,

    /// Timeout applied to every upstream request
    pub(crate) request_timeout: Duration,

    /// sqlx connection string for report records
    pub(crate) database_url: String,
}

/// HTTP response cache policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpCacheConfig {
    /// Entries older than this are treated as absent
    pub ttl: Duration,

    /// JSON snapshot the cache is loaded from and saved to.
    /// `None` keeps the cache in memory only.
    pub backing_store: Option<PathBuf>,
}
