use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default extension for document links
pub const DEFAULT_FILE_EXTENSION: &str = "pdf";

/// Default subdirectory of the output root holding downloaded files
pub const DEFAULT_FILES_DIR: &str = "pdfs";

/// File name of the metadata table inside the output root
pub const METADATA_FILE_NAME: &str = "metadata.csv";

/// Subdirectory of the output root holding per-run log files
pub const LOGS_DIR: &str = "logs";

/// Main configuration structure for a harvest run
///
/// This is the single explicit settings object handed to the pipeline
/// constructor; nothing in the crawler reads ambient state.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Listing pages to start walking from (one pagination branch each)
    #[serde(rename = "start-urls")]
    pub start_urls: Vec<String>,

    /// Root directory for downloaded files, the metadata table and logs
    #[serde(rename = "output-dir")]
    pub output_dir: String,

    /// Optional log verbosity (`error`, `warn`, `info`, `debug`, `trace`)
    #[serde(rename = "log-level", default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Extension that marks an anchor as a document link (case-insensitive)
    #[serde(rename = "file-extension")]
    pub file_extension: String,

    /// Subdirectory of the output root for downloaded files
    #[serde(rename = "files-dir")]
    pub files_dir: String,

    /// Maximum number of pages visited in one run (unbounded when absent)
    #[serde(rename = "max-pages")]
    pub max_pages: Option<u64>,

    /// Maximum number of in-flight requests across all hosts
    #[serde(rename = "max-concurrent-requests")]
    pub max_concurrent_requests: u32,

    /// Maximum number of in-flight requests to a single host
    #[serde(rename = "max-requests-per-host")]
    pub max_requests_per_host: u32,

    /// Minimum time between requests to the same host (milliseconds)
    #[serde(rename = "download-delay-ms")]
    pub download_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Number of retries after the first attempt for retryable failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base delay between retries, doubled on every attempt (milliseconds)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// Whether robots.txt rules are honored
    #[serde(rename = "obey-robots")]
    pub obey_robots: bool,

    /// Domains pagination may follow; empty means any
    #[serde(rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,

    /// Re-download stored artifacts older than this many days
    #[serde(rename = "artifact-expiry-days")]
    pub artifact_expiry_days: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            files_dir: DEFAULT_FILES_DIR.to_string(),
            max_pages: None,
            max_concurrent_requests: 16,
            max_requests_per_host: 8,
            download_delay_ms: 300,
            request_timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 500,
            obey_robots: true,
            allowed_domains: Vec::new(),
            artifact_expiry_days: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: Option<String>,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: env!("CARGO_PKG_NAME").to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
            contact_email: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `Name/Version (+ContactURL; ContactEmail)`, with the comment
    /// omitted when no contact details are configured.
    pub fn header_value(&self) -> String {
        let contacts: Vec<String> = [
            self.contact_url.as_ref().map(|u| format!("+{}", u)),
            self.contact_email.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if contacts.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} ({})",
                self.crawler_name,
                self.crawler_version,
                contacts.join("; ")
            )
        }
    }
}

impl Config {
    /// Creates a configuration with default crawler and user agent settings
    pub fn new(start_urls: Vec<String>, output_dir: impl Into<String>) -> Self {
        Self {
            start_urls,
            output_dir: output_dir.into(),
            log_level: None,
            crawler: CrawlerConfig::default(),
            user_agent: UserAgentConfig::default(),
        }
    }

    /// Absolute output root, with a leading `~/` expanded to the home directory
    pub fn output_root(&self) -> PathBuf {
        let expanded = expand_home(&self.output_dir);
        if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&expanded))
                .unwrap_or(expanded)
        }
    }

    /// Directory that holds downloaded files
    pub fn files_dir(&self) -> PathBuf {
        self.output_root().join(&self.crawler.files_dir)
    }

    /// Path of the metadata table
    pub fn metadata_path(&self) -> PathBuf {
        self.output_root().join(METADATA_FILE_NAME)
    }

    /// Directory that holds per-run log files
    pub fn logs_dir(&self) -> PathBuf {
        self.output_root().join(LOGS_DIR)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(path)
}
