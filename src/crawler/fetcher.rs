//! HTTP fetch layer
//!
//! This module handles every network request made by the crawler:
//! - Building the HTTP client with the configured user agent and timeout
//! - Throttling through the shared `Throttle`
//! - robots.txt compliance, one robots.txt fetch per host per run
//! - Retry with exponential backoff on transient failures
//! - Error classification

use crate::config::Config;
use crate::crawler::coordinator::CancelFlag;
use crate::crawler::scheduler::Throttle;
use crate::robots::{self, ParsedRobots, RobotsCache};
use crate::url::host_key;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Maximum redirect hops followed for one request
pub const MAX_REDIRECTS: usize = 10;

/// Status codes worth another attempt
const RETRYABLE_STATUSES: [u16; 8] = [408, 429, 500, 502, 503, 504, 522, 524];

/// A completed HTTP exchange
///
/// Any status is a completed exchange; callers decide what a non-2xx means.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final URL after redirects
    pub url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Returns true for 2xx statuses
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Content-Type header value, if present and readable
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

/// Failures below the HTTP status level
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("redirect error for {url}: {message}")]
    Redirect { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("failed reading body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("{url} is disallowed by robots.txt")]
    RobotsDenied { url: String },

    #[error("request to {url} was cancelled")]
    Cancelled { url: String },
}

impl TransportError {
    /// Returns true if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connect { .. })
    }

    fn from_reqwest(error: reqwest::Error, url: &Url) -> Self {
        let url = url.to_string();
        if error.is_timeout() {
            Self::Timeout { url }
        } else if error.is_connect() {
            Self::Connect {
                url,
                message: error.to_string(),
            }
        } else if error.is_redirect() {
            Self::Redirect {
                url,
                message: error.to_string(),
            }
        } else if error.is_body() || error.is_decode() {
            Self::Body {
                url,
                message: error.to_string(),
            }
        } else {
            Self::Request {
                url,
                message: error.to_string(),
            }
        }
    }
}

/// The fetch seam used by the walker and the download coordinator
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetches `url`, following redirects
    async fn get(&self, url: &Url) -> Result<FetchResponse, TransportError>;
}

/// Returns true for statuses in the retryable set
pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16())
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use docsweep::config::Config;
/// use docsweep::crawler::build_http_client;
///
/// let config = Config::new(vec!["https://example.org/".to_string()], "./out");
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(config.crawler.request_timeout_secs);

    Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Production fetcher backed by reqwest
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx, 3xx, 4xx other than 408/429 | Returned as is |
/// | HTTP 408, 429, 500, 502, 503, 504, 522, 524 | Retried, last response returned |
/// | Timeout, connection error | Retried, last error returned |
/// | Redirect chain > 10 | Immediate error |
/// | Disallowed by robots.txt | Immediate `RobotsDenied` |
///
/// Retry `n` (starting at 0) waits `retry-backoff-ms * 2^n`.
pub struct HttpFetcher {
    client: Client,
    throttle: Arc<Throttle>,
    robots: Option<RobotsCache>,
    robots_agent: String,
    max_retries: u32,
    retry_backoff: Duration,
    cancel: CancelFlag,
}

impl HttpFetcher {
    /// Creates a fetcher from the run configuration
    pub fn new(config: &Config, cancel: CancelFlag) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;

        Ok(Self {
            client,
            throttle: Arc::new(Throttle::new(&config.crawler)),
            robots: config.crawler.obey_robots.then(RobotsCache::new),
            robots_agent: config.user_agent.crawler_name.clone(),
            max_retries: config.crawler.max_retries,
            retry_backoff: Duration::from_millis(config.crawler.retry_backoff_ms),
            cancel,
        })
    }

    async fn robots_for(&self, cache: &RobotsCache, url: &Url, host: &str) -> Arc<ParsedRobots> {
        cache
            .get_or_load(host, || async {
                let Some(robots_url) = robots::robots_url(url) else {
                    return ParsedRobots::allow_all();
                };

                let parsed = match self.send_once(&robots_url, host).await {
                    Ok(response) => {
                        debug!(host, status = response.status.as_u16(), "Fetched robots.txt");
                        robots::from_response(response.status.as_u16(), &response.body)
                    }
                    Err(e) => {
                        debug!(host, error = %e, "robots.txt unavailable, allowing all");
                        ParsedRobots::allow_all()
                    }
                };

                self.throttle
                    .set_crawl_delay(host, parsed.crawl_delay(&self.robots_agent));
                debug!(
                    host,
                    delay_ms = self.throttle.effective_delay(host).as_millis() as u64,
                    "Host delay set"
                );
                parsed
            })
            .await
    }

    async fn send_once(&self, url: &Url, host: &str) -> Result<FetchResponse, TransportError> {
        let cancelled = || TransportError::Cancelled {
            url: url.to_string(),
        };

        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }
        let _permit = self.throttle.acquire(host).await.map_err(|_| cancelled())?;
        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }
        debug!(
            url = %url,
            host_requests = self.throttle.request_count(host),
            "Sending request"
        );

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, url))?;

        let final_url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(e, url))?;

        Ok(FetchResponse {
            url: final_url,
            status,
            headers,
            body: body.to_vec(),
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get(&self, url: &Url) -> Result<FetchResponse, TransportError> {
        let host = host_key(url).ok_or_else(|| TransportError::Request {
            url: url.to_string(),
            message: "URL has no host".to_string(),
        })?;

        if let Some(cache) = &self.robots {
            let rules = self.robots_for(cache, url, &host).await;
            if !rules.is_allowed(url, &self.robots_agent) {
                return Err(TransportError::RobotsDenied {
                    url: url.to_string(),
                });
            }
        }

        let mut attempt = 0;
        loop {
            let result = self.send_once(url, &host).await;
            let retry = match &result {
                Ok(response) => is_retryable_status(response.status),
                Err(e) => e.is_retryable(),
            };

            if !retry || attempt >= self.max_retries {
                return result;
            }

            let delay = self.backoff(attempt);
            match &result {
                Ok(response) => warn!(
                    url = %url,
                    status = response.status.as_u16(),
                    attempt = attempt + 1,
                    "Retrying after retryable status"
                ),
                Err(e) => warn!(
                    url = %url,
                    error = %e,
                    attempt = attempt + 1,
                    "Retrying after transport error"
                ),
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
