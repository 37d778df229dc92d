//! Job-server backend: caching, authorization and staleness tracking

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use mockito::{Matcher, Server};
use reports_gateway::{
    CachingClient, HttpCache, JobServerClient, NotFound, RenderOutcome, ReportError, ReportStore,
};

mod common;

use common::{LogCapture, http_date, insert, job_server_form};

const PUBLISHED_PATH: &str = "/org/project/workspace/published/file_id";
const UNPUBLISHED_PATH: &str = "/api/v2/releases/file/file_id";
const HTML: &str = "<html><body><p>foo</p></body></html>";

fn job_server_client(token: Option<&str>) -> JobServerClient {
    let cache = Arc::new(HttpCache::new(Duration::from_secs(60)));
    let http = CachingClient::new(Duration::from_secs(5), cache).unwrap();
    JobServerClient::new(http, token.map(str::to_string))
}

#[tokio::test]
async fn test_render_caches_upstream_requests() {
    let mut server = Server::new_async().await;
    let url = format!("{}{PUBLISHED_PATH}", server.url());

    // one uncached probe from validation, one cached probe from the first render
    let head = server
        .mock("HEAD", PUBLISHED_PATH)
        .with_status(200)
        .expect(2)
        .create_async()
        .await;
    let get = server
        .mock("GET", PUBLISHED_PATH)
        .with_status(200)
        .with_header("last-modified", &http_date(Utc::now()))
        .with_body(HTML)
        .expect(1)
        .create_async()
        .await;

    let (controller, _store) = common::controller(&server.url(), false);
    let mut report = controller.create(job_server_form("Test", &url)).await.unwrap();

    let (logs, _guard) = LogCapture::install();
    let first = controller.render(&mut report, false).await.unwrap();
    assert_eq!(logs.count("Cache missed"), 1);

    let second = controller.render(&mut report, false).await.unwrap();
    assert_eq!(logs.count("Cache missed"), 1);
    assert_eq!(first, second);

    head.assert_async().await;
    get.assert_async().await;
}

#[tokio::test]
async fn test_cache_missed_event_fields() {
    let mut server = Server::new_async().await;
    let url = format!("{}{PUBLISHED_PATH}", server.url());
    server.mock("HEAD", PUBLISHED_PATH).with_status(200).create_async().await;
    server
        .mock("GET", PUBLISHED_PATH)
        .with_status(200)
        .with_header("last-modified", &http_date(Utc::now()))
        .with_body(HTML)
        .create_async()
        .await;

    let (controller, store) = common::controller(&server.url(), true);
    let mut report = insert(&store, job_server_form("Fields", &url)).await;

    let (logs, _guard) = LogCapture::install();
    controller.render(&mut report, false).await.unwrap();

    let events = logs.with_message("Cache missed");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].level, tracing::Level::INFO);
    assert_eq!(events[0].fields["report_id"], report.id.to_string());
    assert_eq!(events[0].fields["slug"], "fields");
}

#[tokio::test]
async fn test_published_html_served_without_authorization() {
    let mut server = Server::new_async().await;
    let url = format!("{}{PUBLISHED_PATH}", server.url());
    let head = server
        .mock("HEAD", PUBLISHED_PATH)
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .create_async()
        .await;
    let get = server
        .mock("GET", PUBLISHED_PATH)
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_header("last-modified", &http_date(Utc::now()))
        .with_body(HTML)
        .create_async()
        .await;

    let (controller, store) = common::controller(&server.url(), true);
    let mut report = insert(&store, job_server_form("Published", &url)).await;

    match controller.render(&mut report, false).await.unwrap() {
        RenderOutcome::Rendered(processed) => assert_eq!(processed.body, "<p>foo</p>"),
        other => panic!("expected rendered content, got {other:?}"),
    }
    head.assert_async().await;
    get.assert_async().await;
}

#[tokio::test]
async fn test_unpublished_probe_carries_token() {
    let mut server = Server::new_async().await;
    let url = format!("{}{UNPUBLISHED_PATH}", server.url());
    let head = server
        .mock("HEAD", UNPUBLISHED_PATH)
        .match_header("authorization", "test")
        .with_status(200)
        .create_async()
        .await;

    let client = job_server_client(Some("test"));
    assert!(client.file_exists(&url, false).await.unwrap());
    head.assert_async().await;
}

#[tokio::test]
async fn test_missing_file_fails_probe() {
    let mut server = Server::new_async().await;
    let url = format!("{}{UNPUBLISHED_PATH}", server.url());
    server.mock("HEAD", UNPUBLISHED_PATH).with_status(404).create_async().await;
    let get = server.mock("GET", UNPUBLISHED_PATH).expect(0).create_async().await;

    let (controller, store) = common::controller(&server.url(), true);
    let mut report = insert(&store, job_server_form("Missing", &url)).await;

    let err = controller.render(&mut report, false).await.unwrap_err();
    assert!(matches!(err, ReportError::NotFound(NotFound::Url(u)) if u == url));
    get.assert_async().await;
}

#[tokio::test]
async fn test_validation_reports_missing_file() {
    let mut server = Server::new_async().await;
    let url = format!("{}{PUBLISHED_PATH}", server.url());
    server.mock("HEAD", PUBLISHED_PATH).with_status(404).create_async().await;

    let (controller, store) = common::controller(&server.url(), false);
    let err = controller.create(job_server_form("Invalid", &url)).await.unwrap_err();

    let ReportError::Validation(errors) = err else {
        panic!("expected validation errors, got {err:?}");
    };
    let messages: Vec<&str> = errors.for_field("job_server_url").collect();
    assert_eq!(messages, vec!["File could not be found"]);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_last_updated_written_only_on_change() {
    let mut server = Server::new_async().await;
    let url = format!("{}{PUBLISHED_PATH}", server.url());
    let now = Utc::now();
    server.mock("HEAD", PUBLISHED_PATH).with_status(200).create_async().await;
    let get = server
        .mock("GET", PUBLISHED_PATH)
        .with_status(200)
        .with_header("last-modified", &http_date(now))
        .with_body(HTML)
        .expect(2)
        .create_async()
        .await;

    let (controller, store) = common::controller(&server.url(), true);
    let mut stale = job_server_form("Stale", &url).into_report("stale".to_string());
    stale.last_updated = Some((now - ChronoDuration::days(5)).date_naive());
    let mut report = store.insert(stale).await.unwrap();
    assert_eq!(store.writes(), 1);

    controller.render(&mut report, false).await.unwrap();
    let persisted = store.get(report.id).await.unwrap().unwrap();
    assert_eq!(persisted.last_updated, Some(now.date_naive()));
    assert_eq!(store.writes(), 2);

    // go back upstream: same Last-Modified, so nothing to write
    controller.http_cache().clear();
    controller.render(&mut report, false).await.unwrap();
    assert_eq!(store.writes(), 2);
    assert_eq!(report.last_updated, Some(now.date_naive()));
    get.assert_async().await;
}

#[tokio::test]
async fn test_malformed_last_modified_is_fatal() {
    let mut server = Server::new_async().await;
    let url = format!("{}{PUBLISHED_PATH}", server.url());
    server.mock("HEAD", PUBLISHED_PATH).with_status(200).create_async().await;
    server
        .mock("GET", PUBLISHED_PATH)
        .with_status(200)
        .with_header("last-modified", "sometime last week")
        .with_body(HTML)
        .create_async()
        .await;

    let (controller, store) = common::controller(&server.url(), true);
    let mut report = insert(&store, job_server_form("Malformed", &url)).await;

    let err = controller.render(&mut report, false).await.unwrap_err();
    assert!(matches!(err, ReportError::MalformedTimestamp(v) if v == "sometime last week"));
    assert_eq!(report.last_updated, None);
    assert_eq!(store.writes(), 1);
}
