//! Persistence seam for report records
//!
//! The controller only needs single-row reads and writes; no transaction
//! spans more than one call. A stale `last_updated` written by a concurrent
//! render is corrected by the next render.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use chrono::NaiveDate;
use parking_lot::RwLock;
use uuid::Uuid;

use super::model::{Report, ReportId};
use crate::error::{ReportError, ReportResult};

/// Storage for report records
pub trait ReportStore: Send + Sync {
    fn get(&self, id: ReportId) -> impl Future<Output = ReportResult<Option<Report>>> + Send;

    fn get_by_slug(&self, slug: &str) -> impl Future<Output = ReportResult<Option<Report>>> + Send;

    /// All reports ordered by menu name
    fn list(&self) -> impl Future<Output = ReportResult<Vec<Report>>> + Send;

    /// Persist a new report, returning it with its assigned id
    fn insert(&self, report: Report) -> impl Future<Output = ReportResult<Report>> + Send;

    /// Overwrite every column of an existing report
    fn update(&self, report: &Report) -> impl Future<Output = ReportResult<()>> + Send;

    fn set_last_updated(
        &self,
        id: ReportId,
        date: NaiveDate,
    ) -> impl Future<Output = ReportResult<()>> + Send;

    fn set_cache_token(&self, id: ReportId, token: Uuid) -> impl Future<Output = ReportResult<()>> + Send;

    fn set_use_git_blob(&self, id: ReportId, value: bool) -> impl Future<Output = ReportResult<()>> + Send;
}

/// In-process store; counts writes so callers can assert on them
#[derive(Debug)]
pub struct MemoryReportStore {
    reports: RwLock<BTreeMap<ReportId, Report>>,
    next_id: AtomicI64,
    writes: AtomicUsize,
}

impl Default for MemoryReportStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReportStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            reports: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of successful write operations so far
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn modify(&self, id: ReportId, f: impl FnOnce(&mut Report)) -> ReportResult<()> {
        let mut reports = self.reports.write();
        let report = reports
            .get_mut(&id)
            .ok_or_else(|| ReportError::Store(format!("No report with id {id}")))?;
        f(report);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ReportStore for MemoryReportStore {
    async fn get(&self, id: ReportId) -> ReportResult<Option<Report>> {
        Ok(self.reports.read().get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> ReportResult<Option<Report>> {
        Ok(self.reports.read().values().find(|r| r.slug == slug).cloned())
    }

    async fn list(&self) -> ReportResult<Vec<Report>> {
        let mut reports: Vec<Report> = self.reports.read().values().cloned().collect();
        reports.sort_by(|a, b| a.menu_name.cmp(&b.menu_name));
        Ok(reports)
    }

    async fn insert(&self, mut report: Report) -> ReportResult<Report> {
        let mut reports = self.reports.write();
        if reports.values().any(|r| r.slug == report.slug) {
            return Err(ReportError::Store(format!("Slug '{}' already exists", report.slug)));
        }
        report.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        reports.insert(report.id, report.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(report)
    }

    async fn update(&self, report: &Report) -> ReportResult<()> {
        self.modify(report.id, |stored| *stored = report.clone())
    }

    async fn set_last_updated(&self, id: ReportId, date: NaiveDate) -> ReportResult<()> {
        self.modify(id, |r| r.last_updated = Some(date))
    }

    async fn set_cache_token(&self, id: ReportId, token: Uuid) -> ReportResult<()> {
        self.modify(id, |r| r.cache_token = token)
    }

    async fn set_use_git_blob(&self, id: ReportId, value: bool) -> ReportResult<()> {
        self.modify(id, |r| r.use_git_blob = value)
    }
}
