//! HTML normalization for embedding exported notebooks in report pages.
//!
//! An exported notebook is a full HTML document carrying its own styles,
//! scripts and a body of output cells. The page template embeds only the
//! body, so this module:
//! - extracts the `<body>` content (or takes the input as-is if it is a fragment)
//! - removes every `<script>` element
//! - removes inline event handlers (`on*`) and inline `style` attributes
//! - pulls every `<style>` element out so the caller can re-inject it in `<head>`
//! - wraps each table and preformatted block in its own overflow container
//!
//! The html5ever parser behind kuchiki never fails on malformed markup, so
//! garbage input yields best-effort output rather than an error.

use kuchiki::iter::NodeIterator;
use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef};

use crate::error::{ReportError, ReportResult};
use crate::utils::OVERFLOW_WRAPPER_CLASS;

/// Elements whose content can overflow the page horizontally
const OVERFLOW_PRONE: &[&str] = &["table", "pre"];

/// Sanitized report body plus the styles removed from it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedHtml {
    /// Body fragment, safe to embed unescaped
    pub body: String,
    /// Serialized `<style>` elements in document order
    pub styles: Vec<String>,
}

/// Sanitize raw notebook HTML for embedding.
///
/// Accepts bytes so upstream content can be passed straight through;
/// invalid UTF-8 sequences are replaced rather than rejected.
pub fn process_html(raw: impl AsRef<[u8]>) -> ReportResult<ProcessedHtml> {
    let text = String::from_utf8_lossy(raw.as_ref());
    let document = kuchiki::parse_html().one(text.into_owned());

    let styles = take_elements(&document, "style")?
        .iter()
        .map(serialize_node)
        .collect::<ReportResult<Vec<_>>>()?;

    // Scripts are dropped outright (head and body)
    take_elements(&document, "script")?;

    strip_inline_attributes(&document);
    wrap_overflow_prone(&document)?;

    let body = match document.select_first("body") {
        Ok(body) => serialize_children(body.as_node())?,
        Err(()) => serialize_children(&document)?,
    };

    Ok(ProcessedHtml { body, styles })
}

/// Detach every element matching `selector`, returning them in document order
fn take_elements(document: &NodeRef, selector: &str) -> ReportResult<Vec<NodeRef>> {
    // Must collect before detaching: detaching breaks the traversal
    let matches: Vec<NodeRef> = document
        .select(selector)
        .map_err(|()| ReportError::Render(format!("Invalid CSS selector: {selector}")))?
        .map(|m| m.as_node().clone())
        .collect();

    for node in &matches {
        node.detach();
    }
    Ok(matches)
}

fn is_inline_attribute(local_name: &str) -> bool {
    local_name == "style" || local_name.starts_with("on")
}

fn strip_inline_attributes(document: &NodeRef) {
    for element in document.descendants().elements() {
        element
            .attributes
            .borrow_mut()
            .map
            .retain(|name, _| !is_inline_attribute(&name.local));
    }
}

fn element_name(node: &NodeRef) -> Option<String> {
    match node.data() {
        NodeData::Element(data) => Some(data.name.local.to_string()),
        _ => None,
    }
}

fn has_overflow_prone_ancestor(node: &NodeRef) -> bool {
    node.ancestors()
        .filter_map(|a| element_name(&a))
        .any(|name| OVERFLOW_PRONE.contains(&name.as_str()))
}

/// Fresh, detached `<div class="overflow-wrapper">`
fn overflow_wrapper() -> ReportResult<NodeRef> {
    let fragment = kuchiki::parse_html().one(format!(
        "<div class=\"{OVERFLOW_WRAPPER_CLASS}\"></div>"
    ));
    let wrapper = fragment
        .select_first("div")
        .map_err(|()| ReportError::Render("Failed to build overflow wrapper".into()))?
        .as_node()
        .clone();
    wrapper.detach();
    Ok(wrapper)
}

/// Give each outermost table / pre its own wrapper.
///
/// Nested ones are skipped: the outer wrapper already contains them.
fn wrap_overflow_prone(document: &NodeRef) -> ReportResult<()> {
    let targets: Vec<NodeRef> = document
        .descendants()
        .filter(|node| {
            element_name(node).is_some_and(|name| OVERFLOW_PRONE.contains(&name.as_str()))
        })
        .filter(|node| !has_overflow_prone_ancestor(node))
        .collect();

    for node in targets {
        let wrapper = overflow_wrapper()?;
        node.insert_before(wrapper.clone());
        wrapper.append(node);
    }
    Ok(())
}

fn serialize_node(node: &NodeRef) -> ReportResult<String> {
    let mut output = Vec::new();
    node.serialize(&mut output)
        .map_err(|e| ReportError::Render(format!("Failed to serialize HTML: {e}")))?;
    String::from_utf8(output)
        .map_err(|e| ReportError::Render(format!("Failed to convert HTML to UTF-8: {e}")))
}

fn serialize_children(node: &NodeRef) -> ReportResult<String> {
    node.children()
        .map(|child| serialize_node(&child))
        .collect::<ReportResult<Vec<_>>>()
        .map(|parts| parts.concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_styles_from_head_and_body() {
        let html = r#"<html><head><style>a {color: red;}</style></head>
            <body><p>x</p><div><style>b {}</style></div></body></html>"#;
        let processed = process_html(html).unwrap();

        assert_eq!(processed.styles.len(), 2);
        assert!(processed.styles[0].starts_with("<style>"));
        assert!(processed.styles[0].contains("a {color: red;}"));
        assert!(processed.styles[1].contains("b {}"));
        assert!(!processed.body.contains("<style"));
    }

    #[test]
    fn test_nested_table_gets_single_wrapper() {
        let html = "<table><tr><td><table><tr><td>inner</td></tr></table></td></tr></table>";
        let processed = process_html(html).unwrap();
        assert_eq!(processed.body.matches(OVERFLOW_WRAPPER_CLASS).count(), 1);
    }

    #[test]
    fn test_event_handler_detection() {
        assert!(is_inline_attribute("onclick"));
        assert!(is_inline_attribute("onload"));
        assert!(is_inline_attribute("style"));
        assert!(!is_inline_attribute("class"));
        assert!(!is_inline_attribute("href"));
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let processed = process_html(b"<p>ok \xff\xfe</p>").unwrap();
        assert!(processed.body.starts_with("<p>ok"));
    }
}
