//! Report cache controller
//!
//! Ties a report record to its upstream file: picks the backend, fetches
//! through the shared HTTP cache, keeps `last_updated` in step with the
//! upstream `Last-Modified`, and sanitizes the result.
//!
//! Cache state is only externally observable through the events logged here:
//! `"Cache missed"` when a render went to the network, nothing when every
//! response came from the HTTP cache, and `"Cache token refreshed,
//! redirecting..."` on a forced update.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use super::model::{Report, ReportChanges, ReportForm};
use super::store::ReportStore;
use super::validation::ReportValidator;
use crate::config::GatewayConfig;
use crate::error::{NotFound, ReportError, ReportResult};
use crate::fetchers::{
    ContentFetcher, FetchStrategy, FetchedContent, GithubClient, GithubReport, JobServerClient,
    JobServerReport,
};
use crate::http_cache::{CachingClient, HttpCache};
use crate::rendering::{ProcessedHtml, process_html};
use crate::utils::unique_slug;

/// Result of a render call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Sanitized report body and the style fragments lifted out of it
    Rendered(ProcessedHtml),
    /// The cache token was rotated; send the requester to this URL
    Redirect { location: String },
}

/// Fetches, tracks and renders reports
#[derive(Debug)]
pub struct ReportCacheController<S> {
    store: Arc<S>,
    github: GithubClient,
    job_server: JobServerClient,
    default_branch: String,
    skip_network_validation: bool,
}

impl<S: ReportStore> ReportCacheController<S> {
    #[must_use]
    pub fn new(
        store: Arc<S>,
        github: GithubClient,
        job_server: JobServerClient,
        default_branch: impl Into<String>,
        skip_network_validation: bool,
    ) -> Self {
        Self {
            store,
            github,
            job_server,
            default_branch: default_branch.into(),
            skip_network_validation,
        }
    }

    /// Build both backend clients around one shared HTTP cache
    pub fn from_config(config: &GatewayConfig, store: Arc<S>, cache: Arc<HttpCache>) -> ReportResult<Self> {
        let http = CachingClient::new(config.request_timeout(), cache)?;
        let github = GithubClient::from_config(config, http.clone())?;
        let job_server = JobServerClient::from_config(config, http);
        Ok(Self::new(
            store,
            github,
            job_server,
            config.default_branch(),
            config.skip_network_validation(),
        ))
    }

    /// Like [`Self::from_config`], loading the HTTP cache from its snapshot
    /// file when one is configured
    pub async fn open(config: &GatewayConfig, store: Arc<S>) -> ReportResult<Self> {
        let cache = match config.http_cache_path() {
            Some(path) => HttpCache::load_snapshot(path, config.http_cache_ttl()).await?,
            None => HttpCache::new(config.http_cache_ttl()),
        };
        Self::from_config(config, store, Arc::new(cache))
    }

    /// Write the HTTP cache snapshot, if a backing store is configured
    pub async fn persist_cache(&self, config: &GatewayConfig) -> ReportResult<()> {
        if let Some(path) = config.http_cache_path() {
            self.http_cache().save_snapshot(path).await?;
        }
        Ok(())
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn http_cache(&self) -> &Arc<HttpCache> {
        self.github.http().cache()
    }

    #[must_use]
    pub fn validator(&self) -> ReportValidator<'_> {
        ReportValidator::new(
            &self.github,
            &self.job_server,
            &self.default_branch,
            self.skip_network_validation,
        )
    }

    pub fn strategy(&self, report: &Report) -> ReportResult<FetchStrategy> {
        report.fetch_strategy(&self.default_branch)
    }

    /// Fetch the report's upstream file through the HTTP cache
    pub async fn fetch(&self, report: &Report) -> ReportResult<FetchedContent> {
        match self.strategy(report)? {
            FetchStrategy::SourceControl(location) => {
                GithubReport::new(&self.github, location, report.use_git_blob)
                    .fetch()
                    .await
            }
            FetchStrategy::JobServer { url } => JobServerReport::new(&self.job_server, url).fetch().await,
        }
    }

    /// Render `report`, or rotate its token when `force_update` is set.
    ///
    /// `report` is updated in place with anything persisted along the way.
    pub async fn render(&self, report: &mut Report, force_update: bool) -> ReportResult<RenderOutcome> {
        if force_update {
            self.refresh_cache_token(report).await?;
            return Ok(RenderOutcome::Redirect {
                location: report.absolute_url(),
            });
        }

        let content = self.fetch(report).await?;
        if !content.from_cache {
            tracing::info!(report_id = report.id, slug = %report.slug, "Cache missed");
        }

        if content.used_git_blob && !report.use_git_blob {
            tracing::warn!(
                report_id = report.id,
                slug = %report.slug,
                "Report file too large for contents API, switching to git blob fetches"
            );
            self.store.set_use_git_blob(report.id, true).await?;
            report.use_git_blob = true;
        }

        let upstream_date = content.last_modified.date_naive();
        if report.last_updated != Some(upstream_date) {
            self.store.set_last_updated(report.id, upstream_date).await?;
            tracing::debug!(
                report_id = report.id,
                previous = ?report.last_updated,
                last_updated = %upstream_date,
                "Recorded upstream modification date"
            );
            report.last_updated = Some(upstream_date);
        }

        let processed = process_html(&content.body)?;
        Ok(RenderOutcome::Rendered(processed))
    }

    /// Rotate the cache token and drop the HTTP cache entries for the
    /// report's backend, so the next render goes to the network
    pub async fn refresh_cache_token(&self, report: &mut Report) -> ReportResult<()> {
        let token = Uuid::new_v4();
        self.store.set_cache_token(report.id, token).await?;
        report.cache_token = token;

        match self.strategy(report) {
            Ok(strategy) => {
                self.invalidate_upstream(&strategy)?;
            }
            Err(e) => {
                tracing::debug!(report_id = report.id, error = %e, "No backend to invalidate");
            }
        }

        tracing::info!(
            report_id = report.id,
            slug = %report.slug,
            "Cache token refreshed, redirecting..."
        );
        Ok(())
    }

    /// Remove every HTTP cache entry belonging to `strategy`'s upstream file.
    ///
    /// For GitHub that is everything under the repository, since the folder
    /// listing and blob lookups share the repository URL.
    pub fn invalidate_upstream(&self, strategy: &FetchStrategy) -> ReportResult<usize> {
        let prefix = match strategy {
            FetchStrategy::SourceControl(location) => self.github.cache_prefix(&location.repo)?,
            FetchStrategy::JobServer { url } => url.clone(),
        };
        Ok(self.http_cache().invalidate_prefix(&prefix))
    }

    /// Validate and persist a new report, deriving a unique slug from its
    /// menu name
    pub async fn create(&self, form: ReportForm) -> ReportResult<Report> {
        let taken: HashSet<String> = self.store.list().await?.into_iter().map(|r| r.slug).collect();
        let slug = unique_slug(&form.menu_name, |candidate| taken.contains(candidate));
        let report = form.into_report(slug);

        self.validator().validate(&report, true).await?;
        let saved = self.store.insert(report).await?;
        tracing::info!(report_id = saved.id, slug = %saved.slug, "Report created");
        Ok(saved)
    }

    /// Apply an edit to `report`.
    ///
    /// Any change rotates the cache token. Changing a fetch field also
    /// re-runs upstream validation and drops the HTTP cache entries of both
    /// the old and the new upstream file; display-only edits never touch
    /// the network. `use_git_blob` is left as it was.
    pub async fn update(&self, report: &mut Report, form: ReportForm) -> ReportResult<ReportChanges> {
        let before = report.clone();
        let mut after = before.clone();
        after.apply_form(form);

        let changes = ReportChanges::between(&before, &after);
        if !changes.any() {
            return Ok(changes);
        }

        self.validator().validate(&after, changes.fetch_changed).await?;

        let mut upstream_invalidated = 0;
        if changes.fetch_changed {
            for snapshot in [&before, &after] {
                if let Ok(strategy) = self.strategy(snapshot) {
                    upstream_invalidated += self.invalidate_upstream(&strategy)?;
                }
            }
        }

        after.cache_token = Uuid::new_v4();
        self.store.update(&after).await?;

        tracing::info!(
            report_id = after.id,
            slug = %after.slug,
            token_rotated = true,
            upstream_invalidated,
            "Report updated"
        );
        *report = after;
        Ok(changes)
    }

    /// Fetch a stored report by slug, failing if it does not exist
    pub async fn get_report(&self, slug: &str) -> ReportResult<Report> {
        self.store
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| ReportError::NotFound(NotFound::Report(slug.to_string())))
    }
}
