//! Request handling for `/reports/{slug}/{cache_token}/`

use serde::Serialize;
use uuid::Uuid;

use super::controller::{RenderOutcome, ReportCacheController};
use super::model::Report;
use super::store::ReportStore;
use crate::error::ReportResult;

/// An incoming report page request
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportRequest<'a> {
    pub slug: &'a str,
    /// Token from the request path, if any
    pub cache_token: Option<&'a str>,
    pub force_update: bool,
    pub can_view_drafts: bool,
}

/// Everything the page template needs
#[derive(Debug, Clone, Serialize)]
pub struct ReportPage {
    pub report: Report,
    pub meta_title: String,
    pub notebook_contents: String,
    pub styles: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum ViewResponse {
    Page(Box<ReportPage>),
    Redirect(String),
    NotFound,
}

/// Resolve a report page request.
///
/// A missing, malformed or outdated token redirects to the canonical URL
/// instead of failing, so old links keep working after a token rotation.
pub async fn report_view<S: ReportStore>(
    controller: &ReportCacheController<S>,
    request: ReportRequest<'_>,
) -> ReportResult<ViewResponse> {
    let Some(mut report) = controller.store().get_by_slug(request.slug).await? else {
        return Ok(ViewResponse::NotFound);
    };
    if report.is_draft && !request.can_view_drafts {
        return Ok(ViewResponse::NotFound);
    }

    let token_matches = request
        .cache_token
        .and_then(|t| Uuid::parse_str(t).ok())
        .is_some_and(|t| t == report.cache_token);
    if !token_matches {
        tracing::debug!(slug = request.slug, "Stale or missing cache token, redirecting");
        return Ok(ViewResponse::Redirect(report.absolute_url()));
    }

    match controller.render(&mut report, request.force_update).await? {
        RenderOutcome::Redirect { location } => Ok(ViewResponse::Redirect(location)),
        RenderOutcome::Rendered(processed) => Ok(ViewResponse::Page(Box::new(ReportPage {
            meta_title: report.meta_title(),
            notebook_contents: processed.body,
            styles: processed.styles,
            report,
        }))),
    }
}
