//! SQLite-backed report store.
//!
//! Dates are stored as ISO-8601 `TEXT`, cache tokens as hyphenated UUID
//! `TEXT`, flags as `INTEGER`.

use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::model::{Report, ReportId};
use super::store::ReportStore;
use crate::error::{ReportError, ReportResult};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    menu_name TEXT NOT NULL,
    category TEXT NOT NULL,
    title TEXT,
    description TEXT,
    authors TEXT,
    contact_email TEXT,
    publication_date TEXT NOT NULL,
    last_updated TEXT,
    repo TEXT,
    branch TEXT,
    report_html_file_path TEXT,
    job_server_url TEXT,
    cache_token TEXT NOT NULL,
    use_git_blob INTEGER NOT NULL DEFAULT 0,
    is_draft INTEGER NOT NULL DEFAULT 0
);

-- Navigation is grouped by category
CREATE INDEX IF NOT EXISTS idx_reports_category ON reports(category);
"#;

const SELECT_COLUMNS: &str = "SELECT id, slug, menu_name, category, title, description, authors, \
     contact_email, publication_date, last_updated, repo, branch, report_html_file_path, \
     job_server_url, cache_token, use_git_blob, is_draft FROM reports";

const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_date(value: &str) -> ReportResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| ReportError::Store(format!("Invalid stored date '{value}': {e}")))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn report_from_row(row: &SqliteRow) -> ReportResult<Report> {
    let publication_date: String = row.try_get("publication_date")?;
    let last_updated: Option<String> = row.try_get("last_updated")?;
    let cache_token: String = row.try_get("cache_token")?;

    Ok(Report {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        menu_name: row.try_get("menu_name")?,
        category: row.try_get("category")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        authors: row.try_get("authors")?,
        contact_email: row.try_get("contact_email")?,
        publication_date: parse_date(&publication_date)?,
        last_updated: last_updated.as_deref().map(parse_date).transpose()?,
        repo: row.try_get("repo")?,
        branch: row.try_get("branch")?,
        report_html_file_path: row.try_get("report_html_file_path")?,
        job_server_url: row.try_get("job_server_url")?,
        cache_token: Uuid::parse_str(&cache_token)
            .map_err(|e| ReportError::Store(format!("Invalid stored cache token '{cache_token}': {e}")))?,
        use_git_blob: row.try_get("use_git_blob")?,
        is_draft: row.try_get("is_draft")?,
    })
}

/// Report store persisted in a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl SqliteReportStore {
    /// Open (creating if missing) the database at `url`, e.g.
    /// `sqlite://reports.sqlite` or `sqlite::memory:`.
    pub async fn open(url: &str) -> ReportResult<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(30));
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        // Each connection to an in-memory database sees its own empty database
        let max_connections = if in_memory { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;
        tracing::debug!(url, "Opened report database");

        Ok(Self { pool })
    }

    fn ensure_updated(id: ReportId, rows_affected: u64) -> ReportResult<()> {
        if rows_affected == 0 {
            return Err(ReportError::Store(format!("No report with id {id}")));
        }
        Ok(())
    }
}

impl ReportStore for SqliteReportStore {
    async fn get(&self, id: ReportId) -> ReportResult<Option<Report>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(report_from_row).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> ReportResult<Option<Report>> {
        let sql = format!("{SELECT_COLUMNS} WHERE slug = ?");
        let row = sqlx::query(&sql).bind(slug).fetch_optional(&self.pool).await?;
        row.as_ref().map(report_from_row).transpose()
    }

    async fn list(&self) -> ReportResult<Vec<Report>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY menu_name, id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(report_from_row).collect()
    }

    async fn insert(&self, mut report: Report) -> ReportResult<Report> {
        let result = sqlx::query(
            r#"
            INSERT INTO reports (
                slug, menu_name, category, title, description, authors, contact_email,
                publication_date, last_updated, repo, branch, report_html_file_path,
                job_server_url, cache_token, use_git_blob, is_draft
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.slug)
        .bind(&report.menu_name)
        .bind(&report.category)
        .bind(&report.title)
        .bind(&report.description)
        .bind(&report.authors)
        .bind(&report.contact_email)
        .bind(format_date(report.publication_date))
        .bind(report.last_updated.map(format_date))
        .bind(&report.repo)
        .bind(&report.branch)
        .bind(&report.report_html_file_path)
        .bind(&report.job_server_url)
        .bind(report.cache_token.to_string())
        .bind(report.use_git_blob)
        .bind(report.is_draft)
        .execute(&self.pool)
        .await?;

        report.id = result.last_insert_rowid();
        Ok(report)
    }

    async fn update(&self, report: &Report) -> ReportResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE reports SET
                slug = ?, menu_name = ?, category = ?, title = ?, description = ?,
                authors = ?, contact_email = ?, publication_date = ?, last_updated = ?,
                repo = ?, branch = ?, report_html_file_path = ?, job_server_url = ?,
                cache_token = ?, use_git_blob = ?, is_draft = ?
            WHERE id = ?
            "#,
        )
        .bind(&report.slug)
        .bind(&report.menu_name)
        .bind(&report.category)
        .bind(&report.title)
        .bind(&report.description)
        .bind(&report.authors)
        .bind(&report.contact_email)
        .bind(format_date(report.publication_date))
        .bind(report.last_updated.map(format_date))
        .bind(&report.repo)
        .bind(&report.branch)
        .bind(&report.report_html_file_path)
        .bind(&report.job_server_url)
        .bind(report.cache_token.to_string())
        .bind(report.use_git_blob)
        .bind(report.is_draft)
        .bind(report.id)
        .execute(&self.pool)
        .await?;

        Self::ensure_updated(report.id, result.rows_affected())
    }

    async fn set_last_updated(&self, id: ReportId, date: NaiveDate) -> ReportResult<()> {
        let result = sqlx::query("UPDATE reports SET last_updated = ? WHERE id = ?")
            .bind(format_date(date))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Self::ensure_updated(id, result.rows_affected())
    }

    async fn set_cache_token(&self, id: ReportId, token: Uuid) -> ReportResult<()> {
        let result = sqlx::query("UPDATE reports SET cache_token = ? WHERE id = ?")
            .bind(token.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Self::ensure_updated(id, result.rows_affected())
    }

    async fn set_use_git_blob(&self, id: ReportId, value: bool) -> ReportResult<()> {
        let result = sqlx::query("UPDATE reports SET use_git_blob = ? WHERE id = ?")
            .bind(value)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Self::ensure_updated(id, result.rows_affected())
    }
}
