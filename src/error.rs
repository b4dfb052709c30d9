//! Internal error types for components that do not sit directly on the
//! `pingora::proxy::ProxyHttp` trait surface. Those continue to return
//! `pingora::Result<T>` the way the teacher's `proxy.rs` does.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate path prefix: {0}")]
    DuplicatePrefix(String),
    #[error("unparseable target url in rule {rule}: {source}")]
    BadTargetUrl {
        rule: String,
        #[source]
        source: url::ParseError,
    },
    #[error("extension rule in {rule} has min_bytes > max_bytes ({min} > {max})")]
    InvertedSizeRange { rule: String, min: u64, max: u64 },
    #[error("cache ttl must be >= 0, got {0}")]
    NegativeTtl(i64),
    #[error("failed to parse configuration json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown top-level configuration shape: {0}")]
    UnknownShape(String),
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("blob missing for fingerprint {0}")]
    BlobMissing(String),
    #[error("stored blob length mismatch: expected {expected}, found {found}")]
    LengthMismatch { expected: u64, found: u64 },
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("no path rule matches request path {0}")]
    NotRouted(String),
    #[error("invalid mirror url: {0}")]
    BadMirrorUrl(String),
}
