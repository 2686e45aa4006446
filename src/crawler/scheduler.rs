//! Request throttling shared by every fetch
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore
//! - Per-host concurrency limiting via one semaphore per host
//! - Respecting minimum delays between requests to one host
//! - Integrating robots.txt crawl delays

use crate::config::CrawlerConfig;
use crate::state::HostState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Permits held for the duration of one request
///
/// Dropping it releases both the host slot and the global slot.
#[derive(Debug)]
pub struct ThrottlePermit {
    _host: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

#[derive(Debug)]
struct HostSlot {
    semaphore: Arc<Semaphore>,
    state: HostState,
}

/// Throttle coordinates:
/// - Global concurrency limits (max in-flight requests)
/// - Per-host concurrency limits
/// - Per-host minimum time between requests
#[derive(Debug)]
pub struct Throttle {
    /// Global semaphore for limiting concurrent fetches
    global_semaphore: Arc<Semaphore>,

    /// Per-host semaphores and timing state
    hosts: Mutex<HashMap<String, HostSlot>>,

    /// Maximum in-flight requests per host
    per_host_limit: usize,

    /// Configured minimum delay between requests to one host
    base_delay: Duration,
}

impl Throttle {
    /// Creates a throttle from the crawler configuration
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            global_semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests as usize)),
            hosts: Mutex::new(HashMap::new()),
            per_host_limit: config.max_requests_per_host as usize,
            base_delay: Duration::from_millis(config.download_delay_ms),
        }
    }

    /// Waits until a request to `host` may start
    ///
    /// The host slot is taken first, then the delay is reserved and slept
    /// off, and only then is a global slot taken, so a host that must wait
    /// never holds capacity other hosts could use.
    pub async fn acquire(&self, host: &str) -> Result<ThrottlePermit, AcquireError> {
        let host_semaphore = self.with_host(host, |slot| slot.semaphore.clone());
        let host_permit = host_semaphore.acquire_owned().await?;

        let wait = self.with_host(host, |slot| {
            let now = Instant::now();
            let wait = slot
                .state
                .time_until_next_request(self.base_delay, now)
                .unwrap_or(Duration::ZERO);
            slot.state.record_request(now + wait);
            wait
        });

        if !wait.is_zero() {
            tracing::trace!(host, wait_ms = wait.as_millis() as u64, "Delaying request");
            tokio::time::sleep(wait).await;
        }

        let global_permit = self.global_semaphore.clone().acquire_owned().await?;

        Ok(ThrottlePermit {
            _host: host_permit,
            _global: global_permit,
        })
    }

    /// Records the robots.txt crawl-delay for `host`
    pub fn set_crawl_delay(&self, host: &str, delay: Option<Duration>) {
        self.with_host(host, |slot| slot.state.crawl_delay = delay);
    }

    /// Returns the delay currently enforced between requests to `host`
    pub fn effective_delay(&self, host: &str) -> Duration {
        self.with_host(host, |slot| slot.state.effective_delay(self.base_delay))
    }

    /// Number of requests started against `host`
    pub fn request_count(&self, host: &str) -> u32 {
        let hosts = self.hosts.lock().unwrap_or_else(|p| p.into_inner());
        hosts.get(host).map_or(0, |slot| slot.state.request_count)
    }

    fn with_host<T>(&self, host: &str, f: impl FnOnce(&mut HostSlot) -> T) -> T {
        let mut hosts = self.hosts.lock().unwrap_or_else(|p| p.into_inner());
        let slot = hosts.entry(host.to_string()).or_insert_with(|| HostSlot {
            semaphore: Arc::new(Semaphore::new(self.per_host_limit)),
            state: HostState::new(),
        });
        f(slot)
    }
}
