//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `FrontierState`: Pages already admitted in this run and documents yielded
//! - `HostState`: Per-host request timing used for politeness delays

mod frontier;
mod host_state;

// Re-export main types
pub use frontier::{Admission, FrontierState};
pub use host_state::HostState;
