//! Append-only CSV metadata table
//!
//! The file is opened in append mode and never truncated. Whether a header is
//! needed is decided from the file size on disk when the sink is opened, so
//! any number of runs leaves exactly one header row.

use crate::crawler::DownloadOutcome;
use crate::output::traits::{MetadataRow, RecordDecision, SinkError, SinkResult};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Single writer of the metadata table
#[derive(Debug)]
pub struct MetadataSink {
    path: PathBuf,
    writer: Mutex<csv::Writer<File>>,
}

impl MetadataSink {
    /// Opens the table for appending, writing the header if the file is empty
    pub fn open(path: &Path) -> SinkResult<Self> {
        let open_err = |source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_err)?;
        let is_empty = file.metadata().map_err(open_err)?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);

        if is_empty {
            writer
                .write_record(MetadataRow::HEADER)
                .map_err(|source| SinkError::Write {
                    path: path.to_path_buf(),
                    source,
                })?;
            writer.flush().map_err(|source| SinkError::Flush {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(path = %path.display(), "Wrote metadata header");
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(writer),
        })
    }

    /// Path of the table
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row for a successful outcome
    ///
    /// The row is flushed before the lock is released, so concurrent callers
    /// never interleave partial rows.
    pub fn record(&self, outcome: &DownloadOutcome) -> SinkResult<RecordDecision> {
        let Some(row) = MetadataRow::from_outcome(outcome) else {
            return Ok(RecordDecision::Skipped);
        };

        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        writer.serialize(&row).map_err(|source| SinkError::Write {
            path: self.path.clone(),
            source,
        })?;
        writer.flush().map_err(|source| SinkError::Flush {
            path: self.path.clone(),
            source,
        })?;

        Ok(RecordDecision::Written)
    }

    /// Flushes and closes the table
    pub fn close(self) -> SinkResult<()> {
        self.flush_inner()
    }

    fn flush_inner(&self) -> SinkResult<()> {
        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        writer.flush().map_err(|source| SinkError::Flush {
            path: self.path.clone(),
            source,
        })?;
        writer.get_ref().sync_data().map_err(|source| SinkError::Flush {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for MetadataSink {
    fn drop(&mut self) {
        let writer = self.writer.get_mut().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = writer.flush() {
            warn!(path = %self.path.display(), error = %e, "Failed to flush metadata table on drop");
        }
    }
}
