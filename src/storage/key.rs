//! Storage key derivation

use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Number of hex characters of the URL digest kept in a key
pub const HASH_PREFIX_LEN: usize = 8;

/// Basename used when a URL has no usable last path segment
pub const FALLBACK_BASENAME: &str = "document";

/// Longest basename kept, in bytes, so keys stay under common filename limits
const MAX_BASENAME_LEN: usize = 200;

/// Deterministic, collision-resistant name for a stored artifact
///
/// A key is `<hash-prefix>_<basename>`: the first eight hex characters of the
/// SHA-256 digest of the absolute URL, then a filesystem-safe version of the
/// last path segment with the query stripped. It depends on nothing but the
/// URL, so every run and process derives the same key. Two URLs sharing a
/// basename are told apart by the hash component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    /// Derives the key for a document URL
    ///
    /// # Examples
    ///
    /// ```
    /// use docsweep::storage::StorageKey;
    /// use url::Url;
    ///
    /// let url = Url::parse("https://example.org/files/decision-42.pdf?dl=1").unwrap();
    /// let key = StorageKey::from_url(&url);
    /// assert_eq!(key.basename(), "decision-42.pdf");
    /// assert_eq!(key.hash_prefix().len(), 8);
    /// ```
    pub fn from_url(url: &Url) -> Self {
        let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
        let prefix = &digest[..HASH_PREFIX_LEN];
        Self(format!("{}_{}", prefix, basename_for(url)))
    }

    /// The full key, usable as a file name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hash component of the key
    pub fn hash_prefix(&self) -> &str {
        &self.0[..HASH_PREFIX_LEN]
    }

    /// The human-readable component of the key
    pub fn basename(&self) -> &str {
        &self.0[HASH_PREFIX_LEN + 1..]
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Picks the basename for a URL, synthesizing one when the path has none
fn basename_for(url: &Url) -> String {
    let last_segment = url
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or("");

    let sanitized = sanitize_filename::sanitize(last_segment);
    let sanitized = sanitized.trim();

    if sanitized.is_empty() {
        return FALLBACK_BASENAME.to_string();
    }

    shorten_keeping_extension(sanitized, MAX_BASENAME_LEN)
}

/// Longest trailing `.ext` preserved when a basename is shortened
const MAX_EXTENSION_LEN: usize = 16;

/// Shortens a basename to `max` bytes, cutting the stem so the extension survives
fn shorten_keeping_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }

    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.len() < MAX_EXTENSION_LEN =>
        {
            let stem = truncate_at_char_boundary(stem, max - ext.len() - 1);
            format!("{}.{}", stem, ext)
        }
        _ => truncate_at_char_boundary(name, max).to_string(),
    }
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
