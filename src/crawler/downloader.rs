//! Download coordinator
//!
//! Turns a document link into a terminal [`DownloadOutcome`]. Nothing here
//! returns an error: every failure becomes a `Failed` outcome.

use crate::crawler::fetcher::Fetch;
use crate::crawler::walker::DocumentLinkRecord;
use crate::storage::{ArtifactStore, StorageKey};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Terminal state of one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// The artifact is on disk; `reused` marks a dedup hit
    Stored { path: PathBuf, reused: bool },
    /// Nothing was stored
    Failed { reason: String },
}

/// Result of handling one document link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub document_url: Url,
    pub page_url: Url,
    pub key: StorageKey,
    pub status: OutcomeStatus,
}

impl DownloadOutcome {
    /// Returns true if the artifact is on disk
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Stored { .. })
    }

    /// Returns true if the artifact was already stored before this run asked for it
    pub fn is_reused(&self) -> bool {
        matches!(self.status, OutcomeStatus::Stored { reused: true, .. })
    }

    /// Absolute path of the stored artifact
    pub fn path(&self) -> Option<&Path> {
        match &self.status {
            OutcomeStatus::Stored { path, .. } => Some(path),
            OutcomeStatus::Failed { .. } => None,
        }
    }

    /// Failure reason
    pub fn reason(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Stored { .. } => None,
            OutcomeStatus::Failed { reason } => Some(reason),
        }
    }
}

/// Fetches documents into the artifact store at most once per key
pub struct DownloadCoordinator {
    fetcher: Arc<dyn Fetch>,
    store: Arc<ArtifactStore>,
}

impl DownloadCoordinator {
    pub fn new(fetcher: Arc<dyn Fetch>, store: Arc<ArtifactStore>) -> Self {
        Self { fetcher, store }
    }

    /// Downloads one document unless it is already stored
    ///
    /// The per-key lock is held from the existence check through the write,
    /// so two records for the same URL cause one network fetch.
    pub async fn fetch(&self, record: &DocumentLinkRecord) -> DownloadOutcome {
        let key = StorageKey::from_url(&record.url);
        let _guard = self.store.lock_key(&key).await;

        let status = match self.store.existing(&key).await {
            Some(path) => {
                debug!(url = %record.url, key = %key, "Artifact already stored");
                OutcomeStatus::Stored { path, reused: true }
            }
            None => self.download(record, &key).await,
        };

        let outcome = DownloadOutcome {
            document_url: record.url.clone(),
            page_url: record.page_url.clone(),
            key,
            status,
        };

        if let Some(reason) = outcome.reason() {
            warn!(url = %record.url, reason, "Document download failed");
        } else if let (Some(path), false) = (outcome.path(), outcome.is_reused()) {
            info!(url = %record.url, path = %path.display(), "Document downloaded");
        }

        outcome
    }

    async fn download(&self, record: &DocumentLinkRecord, key: &StorageKey) -> OutcomeStatus {
        let response = match self.fetcher.get(&record.url).await {
            Ok(response) => response,
            Err(e) => {
                return OutcomeStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };

        if !response.is_success() {
            return OutcomeStatus::Failed {
                reason: format!("HTTP {}", response.status),
            };
        }

        match self.store.store(key, &response.body).await {
            Ok(path) => OutcomeStatus::Stored {
                path,
                reused: false,
            },
            Err(e) => OutcomeStatus::Failed {
                reason: e.to_string(),
            },
        }
    }
}
