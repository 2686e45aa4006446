//! Sink types shared by metadata writers
//!
//! This module defines the error type, the fixed row schema and the
//! decision returned for each recorded outcome.

use crate::crawler::DownloadOutcome;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing the metadata table
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to open metadata table {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write metadata row to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to flush metadata table {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// What the sink did with an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDecision {
    /// One row was appended
    Written,
    /// The outcome was a failure; nothing was appended
    Skipped,
}

/// One line of the metadata table
///
/// Field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataRow {
    /// Page the document link was found on
    pub original_url: String,
    /// Absolute path of the stored artifact
    pub local_path: String,
    /// Document URL
    pub file_urls: String,
}

impl MetadataRow {
    /// Column names, in order
    pub const HEADER: [&'static str; 3] = ["original_url", "local_path", "file_urls"];

    /// Projects a successful outcome; failures have no row
    pub fn from_outcome(outcome: &DownloadOutcome) -> Option<Self> {
        let path = outcome.path()?;
        Some(Self {
            original_url: outcome.page_url.to_string(),
            local_path: path.to_string_lossy().into_owned(),
            file_urls: outcome.document_url.to_string(),
        })
    }
}
