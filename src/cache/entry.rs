//! `CacheEntry` (spec.md §3): metadata for one cached response variant. The
//! blob itself lives on disk (see `cache::blob`); this struct is what the
//! in-memory index holds.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub content_type: String,
    pub content_length: u64,
    pub stored_at_unix: i64,
    pub last_access_unix: i64,
    pub hit_count: u64,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl CacheEntry {
    pub fn is_stale(&self, now_unix: i64, ttl_seconds: i64) -> bool {
        ttl_seconds >= 0 && now_unix.saturating_sub(self.stored_at_unix) > ttl_seconds
    }

    pub fn matches_etag(&self, if_none_match: &str) -> bool {
        match &self.etag {
            Some(etag) => etag == if_none_match,
            None => false,
        }
    }

    /// RFC 7232 `If-Modified-Since`: the entry is unchanged if its own
    /// `Last-Modified` is not strictly newer than the date the client sent.
    pub fn not_modified_since(&self, if_modified_since: &str) -> bool {
        let (Some(entry_date), Some(client_date)) = (
            self.last_modified.as_deref().and_then(parse_http_date),
            parse_http_date(if_modified_since),
        ) else {
            return false;
        };
        entry_date <= client_date
    }
}

fn parse_http_date(value: &str) -> Option<std::time::SystemTime> {
    httpdate::parse_http_date(value).ok()
}
