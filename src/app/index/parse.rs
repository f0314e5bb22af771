//! Anchor extraction from upstream listing pages

use scraper::{Html, Selector};

use crate::constants::selectors;
use crate::errors::{ProxyError, ProxyResult};

/// One link found on an upstream listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Link text, whitespace trimmed; the artifact filename
    pub text: String,
    /// href without its fragment
    pub url: String,
    /// Fragment of the href, without the `#`
    pub fragment: Option<String>,
}

/// Extract every anchor with an href, in document order
///
/// # Errors
///
/// Returns `ProxyError::Internal` if the anchor selector cannot be compiled
pub fn parse_anchors(html: &str) -> ProxyResult<Vec<Anchor>> {
    let selector = Selector::parse(selectors::ANCHOR)
        .map_err(|e| ProxyError::Internal(format!("anchor selector: {e}")))?;
    let document = Html::parse_document(html);

    let anchors = document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let (url, fragment) = split_fragment(href);
            Some(Anchor {
                text: element.text().collect::<String>().trim().to_string(),
                url: url.to_string(),
                fragment: fragment.map(str::to_string),
            })
        })
        .collect();
    Ok(anchors)
}

/// Split an href at its first `#`; an empty fragment counts as none
fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((url, fragment)) if !fragment.is_empty() => (url, Some(fragment)),
        Some((url, _)) => (url, None),
        None => (href, None),
    }
}
