//! Frontier walker
//!
//! Visits listing pages one at a time per branch and decides which
//! next-page links are admitted. The coordinator owns the scheduling; the
//! walker only fetches, parses and keeps the visited set.

use crate::crawler::fetcher::{Fetch, TransportError};
use crate::crawler::parser::{decode_html, parse_listing};
use crate::state::{Admission, FrontierState};
use crate::url::{canonicalize_url, is_allowed_domain};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// A document link found on a listing page
///
/// Identity is the absolute document URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentLinkRecord {
    /// Absolute document URL
    pub url: Url,
    /// Final URL of the page the link was found on
    pub page_url: Url,
}

/// What one visited page produced
#[derive(Debug, Clone)]
pub struct PageResult {
    /// URL after redirects
    pub final_url: Url,
    /// Document links in page order
    pub documents: Vec<DocumentLinkRecord>,
    /// Next page, not yet admitted
    pub next_page: Option<Url>,
}

impl PageResult {
    /// A result with no links and no next page
    pub fn empty(final_url: Url) -> Self {
        Self {
            final_url,
            documents: Vec::new(),
            next_page: None,
        }
    }
}

/// Page-level failures; they end the branch but not the run
#[derive(Debug, Error)]
pub enum PageError {
    #[error("failed to fetch page {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("page {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Walks paginated listings
pub struct FrontierWalker {
    fetcher: Arc<dyn Fetch>,
    state: Mutex<FrontierState>,
    extension: String,
    max_pages: Option<u64>,
    allowed_domains: Vec<String>,
}

impl FrontierWalker {
    /// Creates a walker
    ///
    /// `allowed_domains` applies to next-page links only; an empty list
    /// allows every host.
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        extension: impl Into<String>,
        max_pages: Option<u64>,
        allowed_domains: Vec<String>,
    ) -> Self {
        Self {
            fetcher,
            state: Mutex::new(FrontierState::new()),
            extension: extension.into(),
            max_pages,
            allowed_domains,
        }
    }

    /// Admits a start URL
    ///
    /// Start URLs bypass the domain filter but still count against the page
    /// cap and are deduplicated.
    pub fn seed(&self, url: &Url) -> Admission {
        self.lock_state().admit(url, self.max_pages)
    }

    /// Decides whether a next-page link is fetched
    pub fn admit(&self, url: &Url) -> Admission {
        if !is_allowed_domain(url, &self.allowed_domains) {
            return Admission::Offsite;
        }
        self.lock_state().admit(url, self.max_pages)
    }

    /// Fetches and parses one listing page
    pub async fn visit(&self, page_url: &Url) -> Result<PageResult, PageError> {
        let response = self
            .fetcher
            .get(page_url)
            .await
            .map_err(|source| PageError::Fetch {
                url: page_url.to_string(),
                source,
            })?;

        if !response.is_success() {
            return Err(PageError::Status {
                url: page_url.to_string(),
                status: response.status.as_u16(),
            });
        }

        let final_url = response.url.clone();
        let redirected = canonicalize_url(&final_url) != canonicalize_url(page_url);
        if redirected && !self.lock_state().mark_visited(&final_url) {
            info!(
                url = %page_url,
                target = %final_url,
                "Redirect target already visited, skipping its links"
            );
            return Ok(PageResult::empty(final_url));
        }

        let html = match decode_html(response.content_type(), &response.body) {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %page_url, error = %e, "Page is not parseable, skipping its links");
                return Ok(PageResult::empty(final_url));
            }
        };

        let listing = parse_listing(&html, &final_url, &self.extension);
        let documents: Vec<DocumentLinkRecord> = listing
            .document_links
            .into_iter()
            .map(|url| DocumentLinkRecord {
                url,
                page_url: final_url.clone(),
            })
            .collect();

        for record in &documents {
            debug!(page = %final_url, document = %record.url, "Document link found");
        }
        self.lock_state().record_documents(documents.len());

        info!(
            url = %final_url,
            documents = documents.len(),
            has_next = listing.next_page.is_some(),
            "Page visited"
        );

        Ok(PageResult {
            final_url,
            documents,
            next_page: listing.next_page,
        })
    }

    /// Number of pages admitted so far
    pub fn pages_admitted(&self) -> u64 {
        self.lock_state().pages_admitted()
    }

    /// Number of document links yielded so far
    pub fn documents_yielded(&self) -> u64 {
        self.lock_state().documents_yielded()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}
