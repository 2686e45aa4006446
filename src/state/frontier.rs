use crate::url::canonicalize_url;
use std::collections::HashSet;
use url::Url;

/// Decision taken when a page URL is offered to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The page is new and may be fetched
    Admitted,
    /// The page was already admitted in this run; the branch ends here
    AlreadyVisited,
    /// The configured page cap is reached; no further pages are scheduled
    PageLimitReached,
    /// The page is outside the allowed domains
    Offsite,
}

impl Admission {
    /// Returns true if the page should be fetched
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }

    /// Short label used in pagination log events
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::AlreadyVisited => "already_visited",
            Self::PageLimitReached => "page_limit_reached",
            Self::Offsite => "offsite",
        }
    }
}

/// Process-local frontier bookkeeping
///
/// Nothing here is persisted: a restarted run walks again from its start
/// URLs and relies on the artifact store to skip finished downloads.
#[derive(Debug, Default)]
pub struct FrontierState {
    visited: HashSet<String>,
    pages_admitted: u64,
    documents_yielded: u64,
}

impl FrontierState {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a page URL, marking it visited when admitted
    ///
    /// The visited check runs first so a cycle is reported as such even once
    /// the page cap has been reached.
    pub fn admit(&mut self, url: &Url, max_pages: Option<u64>) -> Admission {
        let canonical = canonicalize_url(url);

        if self.visited.contains(&canonical) {
            return Admission::AlreadyVisited;
        }

        if let Some(max) = max_pages {
            if self.pages_admitted >= max {
                return Admission::PageLimitReached;
            }
        }

        self.visited.insert(canonical);
        self.pages_admitted += 1;
        Admission::Admitted
    }

    /// Marks a page reached through a redirect as visited
    ///
    /// Does not count against the page cap. Returns false if the page was
    /// already visited in this run.
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(canonicalize_url(url))
    }

    /// Adds to the count of document links handed downstream
    pub fn record_documents(&mut self, count: usize) {
        self.documents_yielded += count as u64;
    }

    /// Number of pages admitted so far
    pub fn pages_admitted(&self) -> u64 {
        self.pages_admitted
    }

    /// Number of document links yielded so far
    pub fn documents_yielded(&self) -> u64 {
        self.documents_yielded
    }
}
