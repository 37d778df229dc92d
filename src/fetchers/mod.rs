//! Report content fetchers
//!
//! A report's HTML lives in one of two places:
//! - a file in a GitHub repository (`github`), addressed by repo/branch/path
//! - a job-server output (`job_server`), addressed by URL
//!
//! [`FetchStrategy`] records which one applies to a report. Both backends
//! implement [`ContentFetcher`], so callers can probe and fetch without
//! knowing which backend they hold.

pub mod github;
pub mod job_server;

use std::future::Future;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};

pub use github::{GithubClient, GithubReport};
pub use job_server::{JobServerClient, JobServerReport};

/// Location of a report file inside a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Repository name, compared case-insensitively
    pub repo: String,
    pub branch: String,
    /// Path of the HTML file within the repository
    pub path: String,
}

impl SourceLocation {
    /// Folder that contains the report file (`""` for the repository root)
    #[must_use]
    pub fn parent_path(&self) -> String {
        Path::new(&self.path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Base name of the report file
    #[must_use]
    pub fn file_name(&self) -> String {
        Path::new(&self.path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Which backend serves a report
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchStrategy {
    SourceControl(SourceLocation),
    JobServer { url: String },
}

/// Raw upstream content plus the metadata the controller needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub body: Vec<u8>,
    pub last_modified: DateTime<Utc>,
    /// Every request behind this result was answered by the HTTP cache
    pub from_cache: bool,
    /// Content came through the git blob fallback
    pub used_git_blob: bool,
}

/// Capability shared by both report backends
pub trait ContentFetcher {
    /// Lightweight check that the report file exists upstream
    fn probe_exists(&self) -> impl Future<Output = ReportResult<bool>> + Send;

    /// Retrieve the report file and its last-modified time
    fn fetch(&self) -> impl Future<Output = ReportResult<FetchedContent>> + Send;
}

/// Parse an HTTP-date `Last-Modified` value (e.g. `Wed, 21 Oct 2015 07:28:00 GMT`).
///
/// A missing or malformed value is an error: staleness tracking must never
/// fall back to a made-up date.
pub fn parse_last_modified(value: Option<&str>) -> ReportResult<DateTime<Utc>> {
    let raw = value.ok_or_else(|| ReportError::MalformedTimestamp("<missing>".to_string()))?;
    DateTime::parse_from_rfc2822(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ReportError::MalformedTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_http_date() {
        let parsed = parse_last_modified(Some("Wed, 21 Oct 2015 07:28:00 GMT")).unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2015, 10, 21));
        assert_eq!(parsed.hour(), 7);
    }

    #[test]
    fn test_parse_rejects_garbage_and_missing() {
        assert!(matches!(
            parse_last_modified(Some("yesterday-ish")),
            Err(ReportError::MalformedTimestamp(v)) if v == "yesterday-ish"
        ));
        assert!(matches!(
            parse_last_modified(None),
            Err(ReportError::MalformedTimestamp(_))
        ));
    }

    #[test]
    fn test_source_location_parts() {
        let loc = SourceLocation {
            repo: "r".into(),
            branch: "main".into(),
            path: "reports/sub/report.html".into(),
        };
        assert_eq!(loc.parent_path(), "reports/sub");
        assert_eq!(loc.file_name(), "report.html");

        let root = SourceLocation {
            path: "report.html".into(),
            ..loc
        };
        assert_eq!(root.parent_path(), "");
    }
}
