//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML run configuration.
//!
//! # Example
//!
//! ```no_run
//! use docsweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Walking {} start pages", config.start_urls.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, UserAgentConfig, DEFAULT_FILES_DIR, DEFAULT_FILE_EXTENSION, LOGS_DIR,
    METADATA_FILE_NAME,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
