//! Link discovery in page bodies returned by the crawl service.

use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

const ANCHOR_SELECTOR: &str = "a[href], area[href]";

/// Extract the absolute candidate URLs referenced by anchors in `body`.
///
/// Output keeps first-seen order and collapses duplicates. Fragment-only,
/// `javascript:`, `mailto:` and `tel:` references are dropped. Absolute
/// references are kept verbatim; relative ones are resolved against
/// `page_url`. References that fail to resolve are logged and skipped.
pub fn extract_links(body: &str, page_url: &str) -> Vec<String> {
    let base = match Url::parse(page_url) {
        Ok(url) => url,
        Err(e) => {
            warn!(url = %page_url, error = %e, "Cannot resolve links against invalid page URL");
            return Vec::new();
        }
    };

    let Ok(selector) = Selector::parse(ANCHOR_SELECTOR) else {
        warn!("Invalid anchor selector {}", ANCHOR_SELECTOR);
        return Vec::new();
    };

    let document = Html::parse_document(body);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        if let Some(absolute) = resolve_href(&base, href)
            && seen.insert(absolute.clone())
        {
            links.push(absolute);
        }
    }

    debug!(url = %page_url, count = links.len(), "Extracted links");
    links
}

/// Resolve a single href against the page URL.
pub fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || is_non_navigable(href) {
        return None;
    }

    if has_scheme(href) {
        return Some(href.to_string());
    }

    match base.join(href) {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            debug!(href = %href, base = %base, error = %e, "Dropping unresolvable reference");
            None
        }
    }
}

fn is_non_navigable(href: &str) -> bool {
    if href.starts_with('#') {
        return true;
    }
    let lower = href.to_ascii_lowercase();
    lower.starts_with("javascript:") || lower.starts_with("mailto:") || lower.starts_with("tel:")
}

/// RFC 3986 scheme: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"
fn has_scheme(href: &str) -> bool {
    let Some((scheme, _)) = href.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}
