//! Compression selection (spec.md §4.2 "Compression policy"), a pure
//! function over plain values so it's testable without a live response.

use crate::config::schema::CompressionPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Brotli,
    Gzip,
}

impl Encoding {
    pub fn as_header_value(self) -> &'static str {
        match self {
            Encoding::Brotli => "br",
            Encoding::Gzip => "gzip",
        }
    }
}

const COMPRESSIBLE_PREFIXES: [&str; 3] = ["text/", "application/json", "application/javascript"];
const COMPRESSIBLE_EXACT: [&str; 2] = ["image/svg+xml", "application/xml"];
/// "compress-everything upper bound" (spec.md §4.2).
const MAX_COMPRESSIBLE_BYTES: u64 = 10 * 1024 * 1024;

fn is_compressible_content_type(content_type: &str) -> bool {
    let base = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    COMPRESSIBLE_PREFIXES.iter().any(|p| base.starts_with(p)) || COMPRESSIBLE_EXACT.contains(&base.as_str())
}

fn accepts(accept_encoding: &str, encoding: Encoding) -> bool {
    let token = encoding.as_header_value();
    accept_encoding
        .split(',')
        .map(|part| part.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .any(|part| part == token)
}

/// Returns `None` (pass through unmodified) unless the response qualifies
/// for on-the-fly compression.
pub fn choose_encoding(
    policy: &CompressionPolicy,
    accept_encoding: Option<&str>,
    content_type: &str,
    content_length: Option<u64>,
    already_encoded: bool,
) -> Option<Encoding> {
    if already_encoded {
        return None;
    }
    if !is_compressible_content_type(content_type) {
        return None;
    }
    if let Some(len) = content_length {
        if len > MAX_COMPRESSIBLE_BYTES {
            return None;
        }
    }
    let accept_encoding = accept_encoding?;
    if policy.brotli && accepts(accept_encoding, Encoding::Brotli) {
        return Some(Encoding::Brotli);
    }
    if policy.gzip && accepts(accept_encoding, Encoding::Gzip) {
        return Some(Encoding::Gzip);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CompressionPolicy {
        CompressionPolicy { gzip: true, brotli: true }
    }

    #[test]
    fn prefers_brotli_over_gzip() {
        let encoding = choose_encoding(&policy(), Some("gzip, br"), "text/html", Some(1000), false);
        assert_eq!(encoding, Some(Encoding::Brotli));
    }

    #[test]
    fn falls_back_to_gzip_if_brotli_disabled() {
        let mut p = policy();
        p.brotli = false;
        let encoding = choose_encoding(&p, Some("gzip, br"), "text/html", Some(1000), false);
        assert_eq!(encoding, Some(Encoding::Gzip));
    }

    #[test]
    fn already_encoded_passes_through() {
        let encoding = choose_encoding(&policy(), Some("gzip"), "text/html", Some(1000), true);
        assert_eq!(encoding, None);
    }

    #[test]
    fn non_compressible_type_passes_through() {
        let encoding = choose_encoding(&policy(), Some("gzip"), "image/jpeg", Some(1000), false);
        assert_eq!(encoding, None);
    }

    #[test]
    fn oversized_body_passes_through() {
        let encoding = choose_encoding(&policy(), Some("gzip"), "text/html", Some(50 * 1024 * 1024), false);
        assert_eq!(encoding, None);
    }

    #[test]
    fn client_not_accepting_any_supported_encoding_passes_through() {
        let encoding = choose_encoding(&policy(), Some("identity"), "text/html", Some(1000), false);
        assert_eq!(encoding, None);
    }
}
