//! Output module for run results
//!
//! This module handles:
//! - Appending download outcomes to the CSV metadata table
//! - Recording and reporting run statistics

mod csv_sink;
pub mod stats;
mod traits;

pub use csv_sink::MetadataSink;
pub use stats::{print_summary, RunSummary};
pub use traits::{MetadataRow, RecordDecision, SinkError, SinkResult};
