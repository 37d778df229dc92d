//! Builder for `GatewayConfig`
//!
//! Every option has a default, so `GatewayConfig::builder().build()` yields a
//! working configuration for public repositories. `build()` validates the
//! values that would otherwise fail later at request time.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use super::types::{GatewayConfig, HttpCacheConfig};
use crate::error::{ReportError, ReportResult};
use crate::utils::{
    DEFAULT_BRANCH, DEFAULT_DATABASE_URL, DEFAULT_GITHUB_API_URL, DEFAULT_GITHUB_ORGANISATION,
    DEFAULT_HTTP_CACHE_TTL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
};

#[derive(Debug, Clone)]
pub struct GatewayConfigBuilder {
    github_token: Option<String>,
    github_api_url: String,
    github_organisation: String,
    default_branch: String,
    job_server_token: Option<String>,
    skip_network_validation: bool,
    http_cache_ttl: Duration,
    http_cache_path: Option<PathBuf>,
    request_timeout: Duration,
    database_url: String,
}

impl Default for GatewayConfigBuilder {
    fn default() -> Self {
        Self {
            github_token: None,
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            github_organisation: DEFAULT_GITHUB_ORGANISATION.to_string(),
            default_branch: DEFAULT_BRANCH.to_string(),
            job_server_token: None,
            skip_network_validation: false,
            http_cache_ttl: Duration::from_secs(DEFAULT_HTTP_CACHE_TTL_SECS),
            http_cache_path: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Create a builder for configuring a `GatewayConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> ReportResult<Self> {
        GatewayConfigBuilder::from_lookup(|key| std::env::var(key).ok())?.build()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_secs(key: &str, value: &str) -> ReportResult<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ReportError::Config(format!("{key}={value:?} is not a number of seconds: {e}")))
}

impl GatewayConfigBuilder {
    /// Builder seeded from a key lookup (the environment in production).
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ReportResult<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut builder = Self::default();

        builder.github_token = get("GITHUB_TOKEN");
        builder.job_server_token = get("JOB_SERVER_TOKEN");
        if let Some(url) = get("GITHUB_API_URL") {
            builder.github_api_url = url;
        }
        if let Some(org) = get("GITHUB_ORGANISATION") {
            builder.github_organisation = org;
        }
        if let Some(branch) = get("DEFAULT_BRANCH") {
            builder.default_branch = branch;
        }
        if let Some(flag) = get("SKIP_NETWORK_VALIDATION") {
            builder.skip_network_validation = parse_flag(&flag);
        }
        if let Some(ttl) = get("HTTP_CACHE_TTL_SECS") {
            builder.http_cache_ttl = parse_secs("HTTP_CACHE_TTL_SECS", &ttl)?;
        }
        builder.http_cache_path = get("HTTP_CACHE_PATH").map(PathBuf::from);
        if let Some(timeout) = get("REQUEST_TIMEOUT_SECS") {
            builder.request_timeout = parse_secs("REQUEST_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(db) = get("DATABASE_URL") {
            builder.database_url = db;
        }
        Ok(builder)
    }

    #[must_use]
    pub fn github_token(mut self, token: impl Into<String>) -> Self {
        self.github_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn github_api_url(mut self, url: impl Into<String>) -> Self {
        self.github_api_url = url.into();
        self
    }

    #[must_use]
    pub fn github_organisation(mut self, org: impl Into<String>) -> Self {
        self.github_organisation = org.into();
        self
    }

    #[must_use]
    pub fn default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    #[must_use]
    pub fn job_server_token(mut self, token: impl Into<String>) -> Self {
        self.job_server_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn skip_network_validation(mut self, skip: bool) -> Self {
        self.skip_network_validation = skip;
        self
    }

    #[must_use]
    pub fn http_cache_ttl(mut self, ttl: Duration) -> Self {
        self.http_cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn http_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.http_cache_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn build(self) -> ReportResult<GatewayConfig> {
        let api_url = Url::parse(&self.github_api_url)
            .map_err(|e| ReportError::Config(format!("Invalid GitHub API URL '{}': {e}", self.github_api_url)))?;
        if api_url.cannot_be_a_base() {
            return Err(ReportError::Config(format!(
                "GitHub API URL '{}' cannot be used as a base URL",
                self.github_api_url
            )));
        }
        if self.github_organisation.trim().is_empty() {
            return Err(ReportError::Config("GitHub organisation must not be empty".into()));
        }
        if self.default_branch.trim().is_empty() {
            return Err(ReportError::Config("Default branch must not be empty".into()));
        }
        if self.http_cache_ttl.is_zero() {
            return Err(ReportError::Config("HTTP cache TTL must be greater than zero".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(ReportError::Config("Request timeout must be greater than zero".into()));
        }

        Ok(GatewayConfig {
            github_token: self.github_token,
            github_api_url: self.github_api_url.trim_end_matches('/').to_string(),
            github_organisation: self.github_organisation,
            default_branch: self.default_branch,
            job_server_token: self.job_server_token,
            skip_network_validation: self.skip_network_validation,
            http_cache: HttpCacheConfig {
                ttl: self.http_cache_ttl,
                backing_store: self.http_cache_path,
            },
            request_timeout: self.request_timeout,
            database_url: self.database_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::builder().build().unwrap();
        assert_eq!(config.github_api_url(), "https://api.github.com");
        assert_eq!(config.github_organisation(), "opensafely");
        assert_eq!(config.default_branch(), "main");
        assert!(config.github_token().is_none());
        assert!(!config.skip_network_validation());
        assert_eq!(config.http_cache_ttl(), Duration::from_secs(86_400));
        assert!(config.http_cache_path().is_none());
    }

    #[test]
    fn test_from_lookup_reads_environment_keys() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GITHUB_TOKEN", "gh-secret"),
            ("JOB_SERVER_TOKEN", "js-secret"),
            ("SKIP_NETWORK_VALIDATION", "True"),
            ("HTTP_CACHE_TTL_SECS", "60"),
            ("HTTP_CACHE_PATH", "/tmp/http-cache.json"),
            ("GITHUB_API_URL", "http://127.0.0.1:9999/"),
            ("DEFAULT_BRANCH", ""),
        ]);
        let config = GatewayConfigBuilder::from_lookup(|k| env.get(k).map(|v| v.to_string()))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.github_token(), Some("gh-secret"));
        assert_eq!(config.job_server_token(), Some("js-secret"));
        assert!(config.skip_network_validation());
        assert_eq!(config.http_cache_ttl(), Duration::from_secs(60));
        assert_eq!(
            config.http_cache_path(),
            Some(std::path::Path::new("/tmp/http-cache.json"))
        );
        assert_eq!(config.github_api_url(), "http://127.0.0.1:9999");
        // empty values fall back to the default
        assert_eq!(config.default_branch(), "main");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(GatewayConfig::builder().github_api_url("not a url").build().is_err());
        assert!(GatewayConfig::builder().http_cache_ttl(Duration::ZERO).build().is_err());
        assert!(GatewayConfig::builder().github_organisation(" ").build().is_err());

        let err = GatewayConfigBuilder::from_lookup(|k| {
            (k == "REQUEST_TIMEOUT_SECS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ReportError::Config(_)));
    }

    #[test]
    fn test_tokens_are_not_serialized() {
        let config = GatewayConfig::builder()
            .github_token("gh-secret")
            .job_server_token("js-secret")
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
