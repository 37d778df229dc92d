//! Report records and their cached rendering
//!
//! - `model`: the report record and edit diffing
//! - `store` / `sqlite_store`: persistence
//! - `validation`: offline and upstream checks run before every save
//! - `controller`: fetch, staleness tracking, token rotation
//! - `view`: request-level contract for report pages
//! - `catalog`: navigation categories and the activity feed

pub mod catalog;
pub mod controller;
pub mod model;
pub mod sqlite_store;
pub mod store;
pub mod validation;
pub mod view;

pub use catalog::{Activity, ActivityKind, populated_categories, recent_activity};
pub use controller::{RenderOutcome, ReportCacheController};
pub use model::{Report, ReportChanges, ReportForm, ReportId, validate_html_filename};
pub use sqlite_store::SqliteReportStore;
pub use store::{MemoryReportStore, ReportStore};
pub use validation::ReportValidator;
pub use view::{ReportPage, ReportRequest, ViewResponse, report_view};
