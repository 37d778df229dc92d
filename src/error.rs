//! Error types for report fetching, caching and validation
//!
//! Fetch and render failures surface as [`ReportError`]. Validation failures
//! are collected into [`ValidationErrors`] so that every problem with a
//! report can be shown to the editor at once.

use std::fmt;

use thiserror::Error;

/// Result type alias for report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// Upstream resources that can fail to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    /// Repository does not exist in the hosting organisation
    Repo(String),
    /// Path (or its parent folder) does not exist on the branch
    Path { path: String, branch: String },
    /// Job-server URL did not answer the existence probe with success
    Url(String),
    /// No report with this slug
    Report(String),
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFound::Repo(repo) => write!(f, "repository '{repo}'"),
            NotFound::Path { path, branch } => write!(f, "'{path}' (branch {branch})"),
            NotFound::Url(url) => write!(f, "'{url}'"),
            NotFound::Report(slug) => write!(f, "report '{slug}'"),
        }
    }
}

/// Error types for report operations
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0} could not be found")]
    NotFound(NotFound),

    /// Upstream `Last-Modified` missing or unparseable
    #[error("Malformed last-modified timestamp: {0:?}")]
    MalformedTimestamp(String),

    #[error("Upstream returned status {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Invalid upstream payload: {0}")]
    InvalidPayload(String),

    /// Report does not describe exactly one fetch backend
    #[error("Report has no usable source: {0}")]
    InvalidSource(String),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Failed to decode content: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to render HTML: {0}")]
    Render(String),
}

impl From<sqlx::Error> for ReportError {
    fn from(error: sqlx::Error) -> Self {
        ReportError::Store(error.to_string())
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(error: serde_json::Error) -> Self {
        ReportError::InvalidPayload(error.to_string())
    }
}

impl ReportError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReportError::NotFound(_))
    }
}

/// A single user-facing validation problem.
///
/// `field` is `None` for form-level errors that do not belong to one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Option<&'static str>,
    pub message: String,
}

/// All validation problems found for one report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: Some(field),
            message: message.into(),
        });
    }

    pub fn add_form(&mut self, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: None,
            message: message.into(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Messages recorded against `field`
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.errors
            .iter()
            .filter(move |e| e.field == Some(field))
            .map(|e| e.message.as_str())
    }

    /// Form-level messages
    pub fn non_field(&self) -> impl Iterator<Item = &str> {
        self.errors
            .iter()
            .filter(|e| e.field.is_none())
            .map(|e| e.message.as_str())
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| match e.field {
                Some(field) => format!("{field}: {}", e.message),
                None => e.message.clone(),
            })
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_split_by_field() {
        let mut errors = ValidationErrors::new();
        errors.add_field("repo", "'x' could not be found");
        errors.add_form("Error fetching report file: boom");

        assert_eq!(errors.for_field("repo").collect::<Vec<_>>(), vec!["'x' could not be found"]);
        assert_eq!(errors.non_field().count(), 1);
        assert_eq!(
            errors.to_string(),
            "repo: 'x' could not be found; Error fetching report file: boom"
        );
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_empty_validation_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_not_found_display() {
        let err = ReportError::NotFound(NotFound::Path {
            path: "reports/a.html".into(),
            branch: "main".into(),
        });
        assert_eq!(err.to_string(), "'reports/a.html' (branch main) could not be found");
        assert!(err.is_not_found());
    }
}
