//! Robots.txt handling module
//!
//! Rules are fetched through the regular fetch layer, parsed with the
//! robotstxt crate and cached per host for the duration of a run.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::{ParsedRobots, MAX_CRAWL_DELAY};

use url::Url;

/// Returns the robots.txt location for the origin of `url`
///
/// Returns None for URLs without a host.
pub fn robots_url(url: &Url) -> Option<Url> {
    url.host_str()?;
    let mut robots = url.clone();
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    // Credentials never leak into the robots request
    let _ = robots.set_username("");
    let _ = robots.set_password(None);
    Some(robots)
}

/// Builds rules from a robots.txt response
///
/// Only a 2xx response with a decodable body yields rules; anything else
/// (404, server error, binary garbage) allows everything.
pub fn from_response(status: u16, body: &[u8]) -> ParsedRobots {
    if !(200..300).contains(&status) {
        return ParsedRobots::allow_all();
    }

    match std::str::from_utf8(body) {
        Ok(text) => ParsedRobots::from_content(text),
        Err(_) => ParsedRobots::allow_all(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robots_url_strips_path_and_query() {
        let url = Url::parse("https://example.org:8443/decisions?page=2#top").unwrap();
        assert_eq!(
            robots_url(&url).unwrap().as_str(),
            "https://example.org:8443/robots.txt"
        );
    }

    #[test]
    fn test_missing_robots_allows_all() {
        let robots = from_response(404, b"User-agent: *\nDisallow: /");
        assert!(robots.is_allow_all());
    }

    #[test]
    fn test_server_error_allows_all() {
        assert!(from_response(503, b"").is_allow_all());
    }

    #[test]
    fn test_success_parses_rules() {
        let robots = from_response(200, b"User-agent: *\nDisallow: /");
        let url = Url::parse("https://example.org/a.pdf").unwrap();
        assert!(!robots.is_allowed(&url, "docsweep"));
    }

    #[test]
    fn test_non_utf8_body_allows_all() {
        assert!(from_response(200, &[0xff, 0xfe, 0x00]).is_allow_all());
    }
}
