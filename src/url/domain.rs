use url::Url;

/// Returns the politeness key for a URL: lowercase host plus explicit port
///
/// Two origins on the same host but different ports are throttled separately,
/// which keeps local test servers independent of each other.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use docsweep::url::host_key;
///
/// let url = Url::parse("https://EXAMPLE.com/a.pdf").unwrap();
/// assert_eq!(host_key(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Checks if a host matches an allowed-domain pattern
///
/// `example.org` matches the bare host and any of its subdomains, the same
/// way an offsite filter treats an allowed domain. `*.example.org` is accepted
/// as an explicit spelling of the same rule.
///
/// # Examples
///
/// ```
/// use docsweep::url::matches_domain_pattern;
///
/// assert!(matches_domain_pattern("example.org", "example.org"));
/// assert!(matches_domain_pattern("example.org", "www.example.org"));
/// assert!(matches_domain_pattern("*.example.org", "example.org"));
/// assert!(!matches_domain_pattern("example.org", "badexample.org"));
/// ```
pub fn matches_domain_pattern(pattern: &str, host: &str) -> bool {
    let base = pattern.strip_prefix("*.").unwrap_or(pattern).to_lowercase();
    let host = host.to_lowercase();

    if base.is_empty() {
        return false;
    }

    host == base || host.ends_with(&format!(".{}", base))
}

/// Checks whether a URL is inside the allowed domains
///
/// An empty pattern list allows every host.
pub fn is_allowed_domain(url: &Url, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }

    match url.host_str() {
        Some(host) => patterns.iter().any(|p| matches_domain_pattern(p, host)),
        None => false,
    }
}
