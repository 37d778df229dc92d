//! Shared configuration constants for the report gateway
//!
//! Default values used by the configuration builder and the fetchers so
//! that the same numbers are not repeated across modules.

/// Branch used when a report does not name one
pub const DEFAULT_BRANCH: &str = "main";

/// Hosting organisation that owns every report repository
pub const DEFAULT_GITHUB_ORGANISATION: &str = "opensafely";

/// Public GitHub REST endpoint
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default lifetime of an HTTP cache entry: one day
///
/// Reports change rarely; editors who need fresh content use the
/// force-update link, which rotates the cache token and clears the entry.
pub const DEFAULT_HTTP_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Upper bound for a single upstream request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default SQLite database for report records
pub const DEFAULT_DATABASE_URL: &str = "sqlite://reports.sqlite";

/// Class applied to the container wrapped around wide elements
pub const OVERFLOW_WRAPPER_CLASS: &str = "overflow-wrapper";

/// Number of entries shown in the recent activity listing
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Suffix appended to report titles in the page `<title>`
pub const META_TITLE_SUFFIX: &str = "OpenSAFELY: Reports";

/// User agent sent to upstream APIs (GitHub rejects requests without one)
pub const USER_AGENT: &str = concat!("reports-gateway/", env!("CARGO_PKG_VERSION"));

/// Media type requested from the GitHub REST API
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";
