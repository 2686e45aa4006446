//! Artifact storage
//!
//! This module owns the on-disk artifact store:
//! - Deterministic storage keys derived from document URLs
//! - Existence checks that make downloads idempotent across runs
//! - Atomic writes with a single writer per key

mod artifacts;
mod key;

pub use artifacts::{ArtifactStore, KeyGuard};
pub use key::StorageKey;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during artifact store operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to prepare artifact directory {path}: {source}")]
    Setup {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
