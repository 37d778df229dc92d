//! Report validation
//!
//! Offline checks (required fields, file name, exactly one backend) always
//! run. Upstream checks confirm the repository, folder and file exist; they
//! bypass the HTTP cache so a stale positive never lets a broken report
//! through.

use super::model::{Report, validate_html_filename};
use crate::error::{ReportError, ValidationErrors};
use crate::fetchers::{
    ContentFetcher, FetchStrategy, GithubClient, GithubReport, JobServerClient, JobServerReport,
    SourceLocation,
};

const REQUIRED: &str = "This field is required.";

/// Validates reports against both backends
#[derive(Debug, Clone, Copy)]
pub struct ReportValidator<'a> {
    github: &'a GithubClient,
    job_server: &'a JobServerClient,
    default_branch: &'a str,
    skip_network: bool,
}

impl<'a> ReportValidator<'a> {
    #[must_use]
    pub fn new(
        github: &'a GithubClient,
        job_server: &'a JobServerClient,
        default_branch: &'a str,
        skip_network: bool,
    ) -> Self {
        Self {
            github,
            job_server,
            default_branch,
            skip_network,
        }
    }

    /// Checks that need no network access
    #[must_use]
    pub fn check_offline(&self, report: &Report) -> (ValidationErrors, Option<FetchStrategy>) {
        let mut errors = ValidationErrors::new();

        if report.menu_name.trim().is_empty() {
            errors.add_field("menu_name", REQUIRED);
        }
        if report.category.trim().is_empty() {
            errors.add_field("category", REQUIRED);
        }
        if let Some(path) = report.report_html_file_path.as_deref().map(str::trim)
            && !path.is_empty()
            && let Err(message) = validate_html_filename(path)
        {
            errors.add_field("report_html_file_path", message);
        }

        let repo_set = report.repo.as_deref().is_some_and(|r| !r.trim().is_empty());
        let path_set = report
            .report_html_file_path
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        let url_set = report.job_server_url.as_deref().is_some_and(|u| !u.trim().is_empty());
        if !url_set && repo_set && !path_set {
            errors.add_field("report_html_file_path", REQUIRED);
        } else if !url_set && path_set && !repo_set {
            errors.add_field("repo", REQUIRED);
        }

        let strategy = match report.fetch_strategy(self.default_branch) {
            Ok(strategy) => Some(strategy),
            Err(ReportError::InvalidSource(reason)) => {
                if errors.is_empty() {
                    errors.add_form(format!("Report has no usable source: {reason}"));
                }
                None
            }
            Err(e) => {
                errors.add_form(e.to_string());
                None
            }
        };

        (errors, strategy)
    }

    /// Run offline checks, then upstream checks when `check_upstream` is set
    /// and network validation is enabled.
    pub async fn validate(&self, report: &Report, check_upstream: bool) -> Result<(), ValidationErrors> {
        let (mut errors, strategy) = self.check_offline(report);
        let Some(strategy) = strategy else {
            return errors.into_result();
        };
        if !errors.is_empty() || !check_upstream || self.skip_network {
            return errors.into_result();
        }

        match strategy {
            FetchStrategy::SourceControl(location) => {
                self.check_repository(location, &mut errors).await;
            }
            FetchStrategy::JobServer { url } => self.check_job_server(&url, &mut errors).await,
        }

        tracing::debug!(
            report_id = report.id,
            errors = errors.errors().len(),
            "Upstream validation finished"
        );
        errors.into_result()
    }

    async fn check_repository(&self, location: SourceLocation, errors: &mut ValidationErrors) {
        let branch = location.branch.clone();
        let repo_name = location.repo.clone();
        let report = GithubReport::new(self.github, location, false).without_cache();

        match report.repo().await {
            Ok(_) => {}
            Err(ReportError::NotFound(_)) => {
                errors.add_field("repo", format!("'{repo_name}' could not be found"));
                return;
            }
            Err(e) => {
                errors.add_form(format!("Error fetching report file: {e}"));
                return;
            }
        }

        let listing = match report.get_parent_contents().await {
            Ok(listing) => listing,
            Err(e) => {
                errors.add_form(format!("Error fetching report file: {e}"));
                return;
            }
        };
        if report.matching_report_file(&listing).is_none() {
            errors.add_field(
                "report_html_file_path",
                format!("File could not be found (branch {branch})"),
            );
        }
    }

    async fn check_job_server(&self, url: &str, errors: &mut ValidationErrors) {
        let report = JobServerReport::new(self.job_server, url).without_cache();
        match report.probe_exists().await {
            Ok(true) => {}
            Ok(false) => errors.add_field("job_server_url", "File could not be found"),
            Err(e) => errors.add_form(format!("Error fetching report file: {e}")),
        }
    }
}
