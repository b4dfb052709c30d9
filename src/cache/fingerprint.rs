//! Fingerprint computation (spec.md §4.3, §GLOSSARY "Fingerprint"): a SHA-256
//! over the canonicalized upstream URL plus a vary vector of `Accept` and
//! `Accept-Encoding`. Kept as a pure, standalone function (rather than
//! delegated entirely to `pingora::cache::key::CacheKey::combined_bin`) so the
//! uniqueness/stability properties in spec.md §8 are directly unit-testable.

use sha2::{Digest, Sha256};
use url::Url;

/// The vary vector used both to build the cache key's variance and to
/// compute the standalone fingerprint.
pub fn vary_string(accept: Option<&str>, accept_encoding: Option<&str>) -> String {
    format!("{}\n{}", accept.unwrap_or(""), accept_encoding.unwrap_or(""))
}

/// Hex-encoded SHA-256 fingerprint for a cacheable request variant.
pub fn fingerprint_hex(url: &Url, accept: Option<&str>, accept_encoding: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(vary_string(accept, accept_encoding).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_url_and_vary_yields_same_fingerprint() {
        let url = Url::parse("https://origin.example/a.js").unwrap();
        let a = fingerprint_hex(&url, Some("text/html"), Some("gzip"));
        let b = fingerprint_hex(&url, Some("text/html"), Some("gzip"));
        assert_eq!(a, b);
    }

    #[test]
    fn differing_vary_yields_different_fingerprint() {
        let url = Url::parse("https://origin.example/a.js").unwrap();
        let a = fingerprint_hex(&url, Some("text/html"), Some("gzip"));
        let b = fingerprint_hex(&url, Some("text/html"), Some("br"));
        assert_ne!(a, b);
    }

    #[test]
    fn differing_url_yields_different_fingerprint() {
        let a = fingerprint_hex(&Url::parse("https://origin.example/a.js").unwrap(), None, None);
        let b = fingerprint_hex(&Url::parse("https://origin.example/b.js").unwrap(), None, None);
        assert_ne!(a, b);
    }
}
