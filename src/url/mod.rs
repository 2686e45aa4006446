//! URL handling module
//!
//! This module provides page canonicalization for the visited set, host keys
//! for per-host politeness, and allowed-domain matching for pagination.

mod domain;
mod normalize;

use crate::UrlError;
use url::Url;

// Re-export main functions
pub use domain::{host_key, is_allowed_domain, matches_domain_pattern};
pub use normalize::canonicalize_url;

/// Parses a string as an absolute HTTP(S) URL
///
/// # Arguments
///
/// * `url_str` - The URL string to parse
///
/// # Returns
///
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlError)` - The string is not a URL, uses another scheme, or has no host
///
/// # Examples
///
/// ```
/// use docsweep::url::parse_http_url;
///
/// assert!(parse_http_url("https://example.com/listing?page=1").is_ok());
/// assert!(parse_http_url("ftp://example.com/file.pdf").is_err());
/// assert!(parse_http_url("/relative/path").is_err());
/// ```
pub fn parse_http_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_https_url() {
        let url = parse_http_url("https://example.com/decisions?page=2").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let url = parse_http_url("  http://example.com/  ").unwrap();
        assert_eq!(url.as_str(), "http://example.com/");
    }

    #[test]
    fn test_reject_other_scheme() {
        let result = parse_http_url("mailto:someone@example.com");
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_reject_relative() {
        let result = parse_http_url("decisions?page=2");
        assert!(matches!(result, Err(UrlError::Parse(_))));
    }
}
