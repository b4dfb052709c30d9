//! Resolver inputs/outputs (spec.md §3 ResolvedTarget, §4.1 Rule Resolver
//! contract). Decoupled from `pingora::proxy::Session` on purpose: `resolve`
//! is a pure function over these plain types so it is unit-testable without
//! a live connection, the way `path.rs`'s inline `#[cfg(test)]` module in
//! the teacher tests `get_base_path` in isolation.

use url::Url;

use crate::config::CachePolicy;

/// What the Resolver needs from an inbound request (spec.md §4.1 "Inputs").
#[derive(Debug, Clone)]
pub struct ResolveRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: Option<&'a str>,
    /// Lowercased, port stripped.
    pub host: Option<&'a str>,
    pub accept_encoding: Option<&'a str>,
    /// Known up front only for HEAD/upgrade requests; usually `None`
    /// ("size unknown", spec.md §4.1).
    pub content_length_hint: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Proxy,
    Redirect,
}

/// Ephemeral per-request value produced by the Resolver (spec.md §3).
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub upstream_url: Url,
    pub mode: Mode,
    pub cache_policy: CachePolicy,
    /// The PathRule prefix that was matched — used as the Metrics
    /// Collector's counter key (spec.md §4.4 "keyed by the matched PathRule
    /// prefix, not the request path").
    pub matched_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no path rule matches request path {path}")]
pub struct NotRouted {
    pub path: String,
}
