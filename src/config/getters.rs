//! Getter methods for `GatewayConfig`

use std::path::Path;
use std::time::Duration;

use super::types::{GatewayConfig, HttpCacheConfig};

impl GatewayConfig {
    #[must_use]
    pub fn github_token(&self) -> Option<&str> {
        self.github_token.as_deref()
    }

    #[must_use]
    pub fn github_api_url(&self) -> &str {
        &self.github_api_url
    }

    #[must_use]
    pub fn github_organisation(&self) -> &str {
        &self.github_organisation
    }

    #[must_use]
    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    #[must_use]
    pub fn job_server_token(&self) -> Option<&str> {
        self.job_server_token.as_deref()
    }

    #[must_use]
    pub fn skip_network_validation(&self) -> bool {
        self.skip_network_validation
    }

    #[must_use]
    pub fn http_cache(&self) -> &HttpCacheConfig {
        &self.http_cache
    }

    #[must_use]
    pub fn http_cache_ttl(&self) -> Duration {
        self.http_cache.ttl
    }

    #[must_use]
    pub fn http_cache_path(&self) -> Option<&Path> {
        self.http_cache.backing_store.as_deref()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}
