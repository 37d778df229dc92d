pub mod config;
pub mod error;
pub mod fetchers;
pub mod http_cache;
pub mod rendering;
pub mod reports;
pub mod utils;

pub use config::{GatewayConfig, GatewayConfigBuilder, HttpCacheConfig};
pub use error::{FieldError, NotFound, ReportError, ReportResult, ValidationErrors};
pub use fetchers::{
    ContentFetcher, FetchStrategy, FetchedContent, GithubClient, GithubReport, JobServerClient,
    JobServerReport, SourceLocation,
};
pub use http_cache::{CacheKey, CachedResponse, CachingClient, HttpCache, HttpRequest};
pub use rendering::{ProcessedHtml, process_html};
pub use reports::{
    Activity, ActivityKind, MemoryReportStore, RenderOutcome, Report, ReportCacheController,
    ReportChanges, ReportForm, ReportPage, ReportRequest, ReportStore, ReportValidator,
    ReportId, SqliteReportStore, ViewResponse, populated_categories, recent_activity, report_view,
    validate_html_filename,
};
