//! Report records and the field groups that drive cache invalidation

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ReportError, ReportResult};
use crate::fetchers::{FetchStrategy, SourceLocation};
use crate::utils::META_TITLE_SUFFIX;

pub type ReportId = i64;

static HTML_FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*\.html?$").expect("HTML_FILENAME_RE: hardcoded regex is valid"));

/// Check that a report file path names an HTML file
pub fn validate_html_filename(value: &str) -> Result<(), String> {
    if HTML_FILENAME_RE.is_match(value) {
        Ok(())
    } else {
        Err(format!("{value} must be an html file"))
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// A persisted pointer to one externally hosted HTML report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub slug: String,
    /// Short name shown in the side navigation
    pub menu_name: String,
    pub category: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub authors: Option<String>,
    pub contact_email: Option<String>,
    pub publication_date: NaiveDate,
    /// Upstream last-modified date; only ever written by the cache controller
    pub last_updated: Option<NaiveDate>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub report_html_file_path: Option<String>,
    pub job_server_url: Option<String>,
    /// Version marker embedded in the canonical URL
    pub cache_token: Uuid,
    /// The contents endpoint failed for this file once; go straight to the git blob
    pub use_git_blob: bool,
    pub is_draft: bool,
}

impl Report {
    /// `/reports/{slug}/{cache_token}/`
    #[must_use]
    pub fn absolute_url(&self) -> String {
        format!("/reports/{}/{}/", self.slug, self.cache_token)
    }

    #[must_use]
    pub fn meta_title(&self) -> String {
        let title = self.title.as_deref().unwrap_or(&self.menu_name);
        format!("{title} | {META_TITLE_SUFFIX}")
    }

    #[must_use]
    pub fn fetch_fields(&self) -> FetchFields {
        FetchFields {
            repo: trimmed(&self.repo).map(|r| r.to_lowercase()),
            branch: trimmed(&self.branch),
            report_html_file_path: trimmed(&self.report_html_file_path),
            job_server_url: trimmed(&self.job_server_url),
        }
    }

    #[must_use]
    pub fn display_fields(&self) -> DisplayFields {
        DisplayFields {
            menu_name: self.menu_name.clone(),
            category: self.category.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            authors: self.authors.clone(),
            contact_email: self.contact_email.clone(),
            publication_date: self.publication_date,
            is_draft: self.is_draft,
        }
    }

    /// Resolve which backend serves this report.
    ///
    /// Exactly one of (repo + file path) or job-server URL must be set.
    pub fn fetch_strategy(&self, default_branch: &str) -> ReportResult<FetchStrategy> {
        let has_repo_fields = !blank(&self.repo) || !blank(&self.report_html_file_path);
        let has_url = !blank(&self.job_server_url);

        match (has_repo_fields, has_url) {
            (true, true) => Err(ReportError::InvalidSource(
                "both a repository file and a job-server URL are set".into(),
            )),
            (false, false) => Err(ReportError::InvalidSource(
                "either a repository file or a job-server URL is required".into(),
            )),
            (false, true) => Ok(FetchStrategy::JobServer {
                url: trimmed(&self.job_server_url).unwrap_or_default(),
            }),
            (true, false) => {
                let repo = trimmed(&self.repo)
                    .ok_or_else(|| ReportError::InvalidSource("repository is required".into()))?;
                let path = trimmed(&self.report_html_file_path).ok_or_else(|| {
                    ReportError::InvalidSource("report file path is required".into())
                })?;
                let branch = trimmed(&self.branch).unwrap_or_else(|| default_branch.to_string());
                Ok(FetchStrategy::SourceControl(SourceLocation { repo, branch, path }))
            }
        }
    }

    /// Copy the editable fields of `form` onto this report.
    ///
    /// System-managed fields (id, slug, token, `last_updated`, `use_git_blob`)
    /// are left untouched.
    pub fn apply_form(&mut self, form: ReportForm) {
        self.menu_name = form.menu_name;
        self.category = form.category;
        self.title = form.title;
        self.description = form.description;
        self.authors = form.authors;
        self.contact_email = form.contact_email;
        self.publication_date = form.publication_date;
        self.repo = form.repo;
        self.branch = form.branch;
        self.report_html_file_path = form.report_html_file_path;
        self.job_server_url = form.job_server_url;
        self.is_draft = form.is_draft;
    }

    #[must_use]
    pub fn to_form(&self) -> ReportForm {
        ReportForm {
            menu_name: self.menu_name.clone(),
            category: self.category.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            authors: self.authors.clone(),
            contact_email: self.contact_email.clone(),
            publication_date: self.publication_date,
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            report_html_file_path: self.report_html_file_path.clone(),
            job_server_url: self.job_server_url.clone(),
            is_draft: self.is_draft,
        }
    }
}

/// Fields an administrator submits when creating or editing a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportForm {
    pub menu_name: String,
    pub category: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub authors: Option<String>,
    pub contact_email: Option<String>,
    pub publication_date: NaiveDate,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub report_html_file_path: Option<String>,
    pub job_server_url: Option<String>,
    pub is_draft: bool,
}

impl ReportForm {
    /// Unsaved report (id 0) with a fresh cache token
    #[must_use]
    pub fn into_report(self, slug: String) -> Report {
        let mut report = Report {
            id: 0,
            slug,
            menu_name: String::new(),
            category: String::new(),
            title: None,
            description: None,
            authors: None,
            contact_email: None,
            publication_date: self.publication_date,
            last_updated: None,
            repo: None,
            branch: None,
            report_html_file_path: None,
            job_server_url: None,
            cache_token: Uuid::new_v4(),
            use_git_blob: false,
            is_draft: false,
        };
        report.apply_form(self);
        report
    }
}

/// Fields that decide which upstream file is fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFields {
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub report_html_file_path: Option<String>,
    pub job_server_url: Option<String>,
}

/// Fields that only affect how a report is presented
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFields {
    pub menu_name: String,
    pub category: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub authors: Option<String>,
    pub contact_email: Option<String>,
    pub publication_date: NaiveDate,
    pub is_draft: bool,
}

/// Before/after comparison of a report edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportChanges {
    pub fetch_changed: bool,
    pub display_changed: bool,
}

impl ReportChanges {
    #[must_use]
    pub fn between(before: &Report, after: &Report) -> Self {
        Self {
            fetch_changed: before.fetch_fields() != after.fetch_fields(),
            display_changed: before.display_fields() != after.display_fields(),
        }
    }

    #[must_use]
    pub fn any(&self) -> bool {
        self.fetch_changed || self.display_changed
    }
}
