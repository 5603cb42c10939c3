//! Harvest resource references from HTML pages.
//!
//! Every `src` and `href` attribute on the page is collected, stripped of its
//! query string, filtered against pseudo-protocols that never point at a real
//! resource, and resolved against the page URL. The first `<link rel="icon">`
//! is remembered separately so callers can hash the favicon.

use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

mod stream;

pub use stream::{extract_resources_streaming, ResourceStream, StreamError};

const SRC_SKIP_PREFIXES: &[&str] = &["data:", "javascript:", "about:", "blob:"];
const HREF_SKIP_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "#"];

/// Attribute a reference was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    /// `src="..."` on scripts, images, frames.
    Src,
    /// `href="..."` on links and anchors.
    Href,
}

impl Attribute {
    fn skip_prefixes(self) -> &'static [&'static str] {
        match self {
            Self::Src => SRC_SKIP_PREFIXES,
            Self::Href => HREF_SKIP_PREFIXES,
        }
    }
}

/// Resource references harvested from one page, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceSet {
    /// Normalized `src` references.
    pub srcs: Vec<String>,
    /// Normalized `href` references.
    pub hrefs: Vec<String>,
    /// First favicon link declared by the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_href: Option<String>,
}

impl ResourceSet {
    /// Normalizes `raw` and records it unless it was already seen for the
    /// same attribute. Returns `true` when a new entry was added.
    pub fn push(&mut self, attribute: Attribute, raw: &str, base: Option<&Url>) -> bool {
        let Some(value) = normalize_reference(attribute, raw, base) else {
            return false;
        };
        let target = match attribute {
            Attribute::Src => &mut self.srcs,
            Attribute::Href => &mut self.hrefs,
        };
        if target.contains(&value) {
            return false;
        }
        target.push(value);
        true
    }

    /// Records the favicon link if none was seen yet.
    pub fn offer_icon(&mut self, raw: &str, base: Option<&Url>) {
        if self.icon_href.is_some() {
            return;
        }
        self.icon_href = resolve(raw.trim(), base).filter(|value| !value.is_empty());
    }

    /// Total number of `src` and `href` references.
    pub fn len(&self) -> usize {
        self.srcs.len() + self.hrefs.len()
    }

    /// True when the page referenced nothing.
    pub fn is_empty(&self) -> bool {
        self.srcs.is_empty() && self.hrefs.is_empty()
    }

    /// Path components of every reference (`src` first), deduplicated.
    ///
    /// ```
    /// use resource_harvest::{Attribute, ResourceSet};
    /// use url::Url;
    ///
    /// let base = Url::parse("https://example.com/index.html").unwrap();
    /// let mut set = ResourceSet::default();
    /// set.push(Attribute::Src, "js/app.js?v=3", Some(&base));
    /// set.push(Attribute::Href, "https://cdn.example.net/js/app.js", Some(&base));
    /// assert_eq!(set.paths(), vec!["/js/app.js".to_string()]);
    /// ```
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for reference in self.srcs.iter().chain(self.hrefs.iter()) {
            let path = reference_path(reference);
            if !path.is_empty() && !paths.iter().any(|seen| seen == path) {
                paths.push(path.to_string());
            }
        }
        paths
    }
}

/// Applies the harvesting rules to a single attribute value.
///
/// Returns `None` for empty values, pseudo-protocol references and values
/// that cannot be resolved against `base`.
pub fn normalize_reference(attribute: Attribute, raw: &str, base: Option<&Url>) -> Option<String> {
    let trimmed = raw.trim();
    let value = trimmed.split('?').next().unwrap_or_default();
    if value.is_empty() {
        return None;
    }
    let lowered = value.to_ascii_lowercase();
    if attribute
        .skip_prefixes()
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return None;
    }
    resolve(value, base)
}

fn resolve(value: &str, base: Option<&Url>) -> Option<String> {
    match base {
        Some(base) => base.join(value).ok().map(String::from),
        None => Some(value.to_string()),
    }
}

/// Path portion of an absolute or relative reference, without query or fragment.
pub fn reference_path(reference: &str) -> &str {
    let end = reference
        .find(|ch: char| ch == '?' || ch == '#')
        .unwrap_or(reference.len());
    let reference = &reference[..end];
    let authority_rest = match reference.find("://") {
        Some(idx) => Some(&reference[idx + 3..]),
        None => reference.strip_prefix("//"),
    };
    match authority_rest {
        Some(rest) => rest.find('/').map(|slash| &rest[slash..]).unwrap_or("/"),
        None => reference,
    }
}

/// True when a `rel` attribute declares an icon (`icon`, `shortcut icon`).
pub fn is_icon_rel(rel: &str) -> bool {
    rel.split_whitespace()
        .any(|token| token.eq_ignore_ascii_case("icon"))
}

/// Harvests resource references from an HTML document.
///
/// # Example
///
/// ```
/// use resource_harvest::extract_resources;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/").unwrap();
/// let html = r#"<script src="/static/app.js?v=1"></script><a href="mailto:x@y">mail</a>"#;
/// let set = extract_resources(html, Some(&base));
/// assert_eq!(set.srcs, vec!["https://example.com/static/app.js".to_string()]);
/// assert!(set.hrefs.is_empty());
/// ```
pub fn extract_resources(html: &str, base: Option<&Url>) -> ResourceSet {
    let document = Html::parse_document(html);
    let references = Selector::parse("[src], [href]").expect("valid selector for references");
    let icons = Selector::parse("link[rel][href]").expect("valid selector for icon links");

    let mut set = ResourceSet::default();
    for node in document.select(&references) {
        let element = node.value();
        if let Some(src) = element.attr("src") {
            set.push(Attribute::Src, src, base);
        }
        if let Some(href) = element.attr("href") {
            set.push(Attribute::Href, href, base);
        }
    }

    for node in document.select(&icons) {
        let element = node.value();
        let is_icon = element.attr("rel").map(is_icon_rel).unwrap_or(false);
        if let (true, Some(href)) = (is_icon, element.attr("href")) {
            set.offer_icon(href, base);
            break;
        }
    }

    set
}
