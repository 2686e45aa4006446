//! Crawler module for the harvest pipeline
//!
//! This module contains the core pipeline, including:
//! - HTTP fetching with throttling, robots.txt and retry logic
//! - Listing-page parsing and next-page detection
//! - The frontier walker, download coordinator and run coordinator

mod coordinator;
mod downloader;
mod fetcher;
mod parser;
mod scheduler;
mod walker;

pub use coordinator::{CancelFlag, Coordinator};
pub use downloader::{DownloadCoordinator, DownloadOutcome, OutcomeStatus};
pub use fetcher::{
    build_http_client, is_retryable_status, Fetch, FetchResponse, HttpFetcher, TransportError,
    MAX_REDIRECTS,
};
pub use parser::{
    decode_html, extract_document_links, find_next_page, parse_listing, NextPageStrategy,
    ParseError, ParsedListing,
};
pub use scheduler::{Throttle, ThrottlePermit};
pub use walker::{DocumentLinkRecord, FrontierWalker, PageError, PageResult};

use crate::config::Config;
use crate::output::RunSummary;
use crate::SweepError;

/// Runs a complete harvest
///
/// This is the main entry point for starting a run. It will:
/// 1. Validate the configuration
/// 2. Prepare the output and artifact directories
/// 3. Build the HTTP fetch layer
/// 4. Walk every start URL's pagination chain
/// 5. Download each document once and record it in the metadata table
pub async fn crawl(config: Config) -> Result<RunSummary, SweepError> {
    Coordinator::new(config)?.run().await
}
