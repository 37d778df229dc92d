//! Slug helpers for report URLs

use std::sync::LazyLock;

use regex::Regex;

static NON_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("NON_SLUG_RE: hardcoded regex is valid"));

/// Lowercase `s` and collapse every run of non-alphanumeric characters into `-`.
///
/// ```
/// # use reports_gateway::utils::slugify;
/// assert_eq!(slugify("  My Report: 2021 (v2) "), "my-report-2021-v2");
/// ```
#[must_use]
pub fn slugify(s: &str) -> String {
    let lowered = s.to_lowercase();
    NON_SLUG_RE
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Slugify `base` and append `-2`, `-3`, ... until `taken` returns false.
///
/// An empty slug falls back to `report`.
pub fn unique_slug(base: &str, mut taken: impl FnMut(&str) -> bool) -> String {
    let mut slug = slugify(base);
    if slug.is_empty() {
        slug = "report".to_string();
    }
    if !taken(&slug) {
        return slug;
    }
    (2..)
        .map(|n| format!("{slug}-{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or(slug)
}
