use url::Url;

/// Canonicalizes a page URL for the visited set
///
/// # Canonicalization Steps
///
/// 1. Remove the fragment (everything after #)
/// 2. Sort query parameters by key, then value (stable for repeated keys)
/// 3. Drop an empty query string (trailing ?)
///
/// Host lowercasing, default-port removal and dot-segment resolution are
/// already performed by the `url` parser. Scheme, path case and trailing
/// slashes are left alone since listing sites often treat them as distinct.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use docsweep::url::canonicalize_url;
///
/// let url = Url::parse("https://Example.com/list?page=2&sort=asc#results").unwrap();
/// assert_eq!(canonicalize_url(&url), "https://example.com/list?page=2&sort=asc");
/// ```
pub fn canonicalize_url(url: &Url) -> String {
    let mut canonical = url.clone();
    canonical.set_fragment(None);

    if canonical.query().is_some() {
        let mut params: Vec<(String, String)> = canonical
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.sort();

        if params.is_empty() {
            canonical.set_query(None);
        } else {
            canonical.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    canonical.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(s: &str) -> String {
        canonicalize_url(&Url::parse(s).unwrap())
    }

    #[test]
    fn test_remove_fragment() {
        assert_eq!(
            canon("https://example.com/page#section"),
            "https://example.com/page"
        );
    }

    #[test]
    fn test_sort_query_params() {
        assert_eq!(
            canon("https://example.com/page?b=2&a=1"),
            "https://example.com/page?a=1&b=2"
        );
    }

    #[test]
    fn test_reordered_queries_are_same_page() {
        assert_eq!(
            canon("https://example.com/search?page=3&q=appeal"),
            canon("https://example.com/search?q=appeal&page=3#top")
        );
    }

    #[test]
    fn test_empty_query_removed() {
        assert_eq!(canon("https://example.com/page?"), "https://example.com/page");
    }

    #[test]
    fn test_repeated_keys_kept() {
        assert_eq!(
            canon("https://example.com/p?tag=b&tag=a"),
            "https://example.com/p?tag=a&tag=b"
        );
    }

    #[test]
    fn test_different_pages_stay_distinct() {
        assert_ne!(
            canon("https://example.com/list?page=1"),
            canon("https://example.com/list?page=2")
        );
    }

    #[test]
    fn test_lowercase_host_and_dot_segments() {
        assert_eq!(
            canon("https://EXAMPLE.COM/a/../b/./c"),
            "https://example.com/b/c"
        );
    }

    #[test]
    fn test_path_case_preserved() {
        assert_eq!(
            canon("https://example.com/Decisions"),
            "https://example.com/Decisions"
        );
    }
}
