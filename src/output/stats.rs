//! Run statistics
//!
//! Counters collected by the coordinator while a run is in progress and
//! reported once it ends.

use std::time::Duration;
use tracing::info;

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages fetched and parsed (including pages that yielded nothing)
    pub pages_visited: u64,

    /// Pages whose fetch failed or returned a non-2xx status
    pub pages_failed: u64,

    /// Document links handed to the download coordinator
    pub documents_found: u64,

    /// Documents that produced an outcome
    pub documents_attempted: u64,

    /// Documents fetched over the network and stored
    pub documents_downloaded: u64,

    /// Documents already present in the artifact store
    pub documents_reused: u64,

    /// Documents that ended in a failed outcome
    pub documents_failed: u64,

    /// Rows appended to the metadata table
    pub rows_written: u64,

    /// Wall-clock time of the run
    pub duration: Duration,
}

impl RunSummary {
    /// Creates a new empty run summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents that ended up on disk (downloaded or reused)
    pub fn documents_succeeded(&self) -> u64 {
        self.documents_downloaded + self.documents_reused
    }

    /// Returns the document success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.documents_attempted == 0 {
            return 0.0;
        }
        (self.documents_succeeded() as f64 / self.documents_attempted as f64) * 100.0
    }

    /// Emits the summary as a structured log event
    pub fn log(&self) {
        info!(
            pages_visited = self.pages_visited,
            pages_failed = self.pages_failed,
            documents_found = self.documents_found,
            documents_attempted = self.documents_attempted,
            documents_succeeded = self.documents_succeeded(),
            documents_reused = self.documents_reused,
            documents_failed = self.documents_failed,
            rows_written = self.rows_written,
            duration_secs = self.duration.as_secs_f64(),
            "Run summary"
        );
    }
}

/// Prints the summary to stdout in a formatted manner
pub fn print_summary(summary: &RunSummary) {
    println!("=== Run Summary ===\n");

    println!("Pages:");
    println!("  Visited: {}", summary.pages_visited);
    println!("  Failed: {}", summary.pages_failed);
    println!();

    println!("Documents:");
    println!("  Found: {}", summary.documents_found);
    println!("  Attempted: {}", summary.documents_attempted);
    println!(
        "  Succeeded: {} ({} downloaded, {} already stored)",
        summary.documents_succeeded(),
        summary.documents_downloaded,
        summary.documents_reused
    );
    println!("  Failed: {}", summary.documents_failed);
    println!();

    println!("Metadata rows written: {}", summary.rows_written);
    println!(
        "Success Rate: {:.1}% in {:.1}s",
        summary.success_rate(),
        summary.duration.as_secs_f64()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_summary_new() {
        let summary = RunSummary::new();
        assert_eq!(summary.pages_visited, 0);
        assert_eq!(summary.documents_succeeded(), 0);
    }

    #[test]
    fn test_documents_succeeded() {
        let summary = RunSummary {
            documents_downloaded: 3,
            documents_reused: 2,
            ..RunSummary::default()
        };
        assert_eq!(summary.documents_succeeded(), 5);
    }

    #[test]
    fn test_success_rate() {
        let summary = RunSummary {
            documents_attempted: 4,
            documents_downloaded: 3,
            documents_failed: 1,
            ..RunSummary::default()
        };
        assert!((summary.success_rate() - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_success_rate_zero_documents() {
        assert_eq!(RunSummary::new().success_rate(), 0.0);
    }
}
