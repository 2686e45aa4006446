//! Per-run robots.txt cache
//!
//! Each host's robots.txt is fetched at most once per run. Concurrent
//! requests to a host that has not been checked yet wait on the same fetch.

use crate::robots::ParsedRobots;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<Arc<ParsedRobots>>>;

/// Robots rules keyed by host key (`host[:port]`)
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rules for `host`, running `load` only on first use
    pub async fn get_or_load<F, Fut>(&self, host: &str, load: F) -> Arc<ParsedRobots>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ParsedRobots>,
    {
        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
            entries.entry(host.to_string()).or_default().clone()
        };

        slot.get_or_init(|| async { Arc::new(load().await) })
            .await
            .clone()
    }
}
