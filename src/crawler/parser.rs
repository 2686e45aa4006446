//! HTML parser for listing pages
//!
//! This module handles parsing a listing page to extract:
//! - Document links (anchors whose path ends in the configured extension)
//! - At most one next-page link, found by an ordered list of strategies

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Reasons a page body could not be treated as HTML
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("content type {content_type} is not HTML")]
    NotHtml { content_type: String },

    #[error("body is not valid UTF-8")]
    Decode,
}

/// Links extracted from one listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedListing {
    /// Document links in first-seen order, without duplicates
    pub document_links: Vec<Url>,

    /// The next page, if any strategy found one
    pub next_page: Option<Url>,
}

/// Ways of spotting the "next page" link, tried in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPageStrategy {
    /// `<a>` or `<link>` with `next` in its `rel` token list
    RelNext,
    /// `<a>` whose `aria-label` contains "next" (case-insensitive)
    AriaLabel,
    /// `<a>` whose whitespace-normalized text is exactly `>`
    Glyph,
}

impl NextPageStrategy {
    /// All strategies in priority order
    pub const ORDER: [NextPageStrategy; 3] = [Self::RelNext, Self::AriaLabel, Self::Glyph];

    /// Short label used in log events
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelNext => "rel_next",
            Self::AriaLabel => "aria_label",
            Self::Glyph => "glyph",
        }
    }

    fn selector(&self) -> &'static str {
        match self {
            Self::RelNext => "a[rel], link[rel]",
            Self::AriaLabel => "a[aria-label]",
            Self::Glyph => "a",
        }
    }

    fn matches(&self, element: &ElementRef) -> bool {
        let el = element.value();
        match self {
            Self::RelNext => el
                .attr("rel")
                .map(|rel| rel.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case("next")))
                .unwrap_or(false),
            Self::AriaLabel => el
                .attr("aria-label")
                .map(|label| label.to_lowercase().contains("next"))
                .unwrap_or(false),
            Self::Glyph => {
                let text = element.text().collect::<Vec<_>>().join(" ");
                text.split_whitespace().collect::<Vec<_>>().join(" ") == ">"
            }
        }
    }

    /// Applies this strategy to a parsed document
    ///
    /// Only the first matching element counts. If its `href` is missing,
    /// blank or unusable, the strategy yields nothing.
    pub fn find(&self, document: &Html, base_url: &Url) -> Option<Url> {
        let selector = Selector::parse(self.selector()).ok()?;
        let element = document.select(&selector).find(|el| self.matches(el))?;
        let href = element.value().attr("href")?;
        resolve_link(href, base_url)
    }
}

/// Decodes a page body as HTML text
///
/// A Content-Type that names something other than HTML is rejected; a
/// missing Content-Type is given the benefit of the doubt.
pub fn decode_html(content_type: Option<&str>, body: &[u8]) -> Result<String, ParseError> {
    if let Some(content_type) = content_type {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if !mime.is_empty() && !mime.contains("html") {
            return Err(ParseError::NotHtml {
                content_type: content_type.to_string(),
            });
        }
    }

    String::from_utf8(body.to_vec()).map_err(|_| ParseError::Decode)
}

/// Parses a listing page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` whose resolved path ends in `.<extension>`
///   (case-insensitive), including anchors with a `download` attribute
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
/// - Anything that is not http(s) after resolution
///
/// Hrefs are resolved against `base_url`, which should be the final URL of
/// the page after redirects.
///
/// # Example
///
/// ```no_run
/// use docsweep::crawler::parse_listing;
/// use url::Url;
///
/// let html = r#"<a href="decision1.pdf">One</a><a rel="next" href="?page=2">Next</a>"#;
/// let base_url = Url::parse("https://example.org/decisions").unwrap();
/// let listing = parse_listing(html, &base_url, "pdf");
/// assert_eq!(listing.document_links.len(), 1);
/// assert!(listing.next_page.is_some());
/// ```
pub fn parse_listing(html: &str, base_url: &Url, extension: &str) -> ParsedListing {
    let document = Html::parse_document(html);

    ParsedListing {
        document_links: extract_document_links(&document, base_url, extension),
        next_page: find_next_page(&document, base_url).map(|(url, _)| url),
    }
}

/// Extracts document links in first-seen order, collapsing duplicates
pub fn extract_document_links(document: &Html, base_url: &Url, extension: &str) -> Vec<Url> {
    let suffix = format!(".{}", extension.trim_start_matches('.').to_ascii_lowercase());
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        if !url.path().to_ascii_lowercase().ends_with(&suffix) {
            continue;
        }

        if seen.insert(url.as_str().to_string()) {
            links.push(url);
        }
    }

    links
}

/// Finds the next-page link, returning it with the strategy that matched
pub fn find_next_page(document: &Html, base_url: &Url) -> Option<(Url, NextPageStrategy)> {
    NextPageStrategy::ORDER
        .iter()
        .find_map(|strategy| strategy.find(document, base_url).map(|url| (url, *strategy)))
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - empty hrefs
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    matches!(absolute_url.scheme(), "http" | "https").then_some(absolute_url)
}
