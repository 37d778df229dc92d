//! Test utilities shared by the report gateway integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use reports_gateway::{GatewayConfig, MemoryReportStore, Report, ReportCacheController, ReportForm, ReportStore};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// One captured tracing event
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl EventVisitor {
    fn record(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, format!("{value:?}"));
    }
}

/// Layer recording every event emitted while it is installed
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

impl LogCapture {
    /// Install as the thread's default subscriber until the guard drops.
    ///
    /// Only sees events from the current thread, so use it with
    /// current-thread `#[tokio::test]`s.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.events().into_iter().filter(|e| e.message == message).collect()
    }

    pub fn count(&self, message: &str) -> usize {
        self.with_message(message).len()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

static BETWEEN_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+").unwrap());
static BEFORE_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+<").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Collapse formatting whitespace so markup can be compared structurally
pub fn normalize_html(html: &str) -> String {
    let html = BETWEEN_TAGS.replace_all(html.trim(), ">");
    let html = BEFORE_TAGS.replace_all(&html, "<");
    WHITESPACE.replace_all(&html, " ").into_owned()
}

pub fn assert_html_equal(actual: &str, expected: &str) {
    assert_eq!(normalize_html(actual), normalize_html(expected));
}

/// `Last-Modified` header value for `at`
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn form(menu_name: &str) -> ReportForm {
    ReportForm {
        menu_name: menu_name.to_string(),
        category: "Reports".to_string(),
        title: Some(format!("{menu_name} title")),
        description: Some("A test report".to_string()),
        authors: None,
        contact_email: None,
        publication_date: date(2021, 1, 1),
        repo: None,
        branch: None,
        report_html_file_path: None,
        job_server_url: None,
        is_draft: false,
    }
}

pub fn job_server_form(menu_name: &str, url: &str) -> ReportForm {
    ReportForm {
        job_server_url: Some(url.to_string()),
        ..form(menu_name)
    }
}

pub fn github_form(menu_name: &str, repo: &str, branch: &str, path: &str) -> ReportForm {
    ReportForm {
        repo: Some(repo.to_string()),
        branch: Some(branch.to_string()),
        report_html_file_path: Some(path.to_string()),
        ..form(menu_name)
    }
}

/// Configuration pointing both backends at a mock server
pub fn config(server_url: &str, skip_network_validation: bool) -> GatewayConfig {
    GatewayConfig::builder()
        .github_api_url(server_url)
        .job_server_token("test")
        .skip_network_validation(skip_network_validation)
        .build()
        .unwrap()
}

pub fn controller(
    server_url: &str,
    skip_network_validation: bool,
) -> (ReportCacheController<MemoryReportStore>, Arc<MemoryReportStore>) {
    let config = config(server_url, skip_network_validation);
    let store = Arc::new(MemoryReportStore::new());
    let cache = Arc::new(reports_gateway::HttpCache::new(config.http_cache_ttl()));
    let controller = ReportCacheController::from_config(&config, store.clone(), cache).unwrap();
    (controller, store)
}

/// Persist a report without running validation
pub async fn insert(store: &MemoryReportStore, form: ReportForm) -> Report {
    let slug = reports_gateway::utils::slugify(&form.menu_name);
    store.insert(form.into_report(slug)).await.unwrap()
}
