//! Listings shown around reports: navigation categories and recent activity

use chrono::NaiveDate;
use serde::Serialize;

use super::model::Report;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActivityKind {
    Published,
    Updated,
}

/// One entry in the recent activity feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub date: NaiveDate,
    pub slug: String,
    pub menu_name: String,
}

/// Sorted distinct categories that contain at least one report
#[must_use]
pub fn populated_categories(reports: &[Report]) -> Vec<String> {
    let mut categories: Vec<String> = reports.iter().map(|r| r.category.clone()).collect();
    categories.sort();
    categories.dedup();
    categories
}

/// Publication and update events, newest first.
///
/// Events on the same date keep the order of `reports`.
#[must_use]
pub fn recent_activity(reports: &[Report], limit: usize) -> Vec<Activity> {
    let mut events = Vec::with_capacity(reports.len());
    for report in reports {
        let event = |kind, date| Activity {
            kind,
            date,
            slug: report.slug.clone(),
            menu_name: report.menu_name.clone(),
        };
        events.push(event(ActivityKind::Published, report.publication_date));
        if let Some(updated) = report.last_updated
            && updated != report.publication_date
        {
            events.push(event(ActivityKind::Updated, updated));
        }
    }

    // stable sort: ties keep input order
    events.sort_by(|a, b| b.date.cmp(&a.date));
    events.truncate(limit);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::model::ReportForm;

    fn report(name: &str, category: &str, published: NaiveDate) -> Report {
        ReportForm {
            menu_name: name.into(),
            category: category.into(),
            title: None,
            description: None,
            authors: None,
            contact_email: None,
            publication_date: published,
            repo: None,
            branch: None,
            report_html_file_path: None,
            job_server_url: Some("https://jobs.example/published/1".into()),
            is_draft: false,
        }
        .into_report(name.to_lowercase())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
    }

    #[test]
    fn test_populated_categories() {
        let reports = vec![
            report("a", "Reports", day(1)),
            report("b", "Analysis", day(1)),
            report("c", "Reports", day(1)),
        ];
        assert_eq!(populated_categories(&reports), vec!["Analysis", "Reports"]);
        assert!(populated_categories(&[]).is_empty());
    }

    #[test]
    fn test_recent_activity_newest_first_and_truncated() {
        let reports: Vec<Report> = (1..=12).map(|d| report(&format!("r{d}"), "Reports", day(d))).collect();
        let activity = recent_activity(&reports, 10);
        assert_eq!(activity.len(), 10);
        assert_eq!(activity[0].slug, "r12");
        assert_eq!(activity[9].slug, "r3");
        assert!(activity.iter().all(|a| a.kind == ActivityKind::Published));
    }

    #[test]
    fn test_update_events() {
        let mut updated = report("updated", "Reports", day(1));
        updated.last_updated = Some(day(5));
        let mut same_day = report("same", "Reports", day(3));
        same_day.last_updated = Some(day(3));

        let activity = recent_activity(&[updated, same_day], 10);
        let summary: Vec<(ActivityKind, &str)> =
            activity.iter().map(|a| (a.kind, a.slug.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (ActivityKind::Updated, "updated"),
                (ActivityKind::Published, "same"),
                (ActivityKind::Published, "updated"),
            ]
        );
    }

    #[test]
    fn test_ties_keep_input_order() {
        let reports = vec![report("b", "R", day(2)), report("a", "R", day(2))];
        let slugs: Vec<String> = recent_activity(&reports, 10).into_iter().map(|a| a.slug).collect();
        assert_eq!(slugs, vec!["b", "a"]);
    }
}
