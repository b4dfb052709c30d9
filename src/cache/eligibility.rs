//! Cacheability decision (spec.md §4.3 "Eligibility"), kept as a pure
//! function over plain values so it is testable without a live response.

use crate::config::schema::CachePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Other,
}

/// Everything the eligibility check needs from an upstream response, without
/// depending on `pingora::http::ResponseHeader`.
#[derive(Debug, Clone)]
pub struct ResponseFacts<'a> {
    pub method: Method,
    pub status: u16,
    pub extension: Option<&'a str>,
    pub content_length: Option<u64>,
    pub cache_control: Option<&'a str>,
    pub vary: Option<&'a str>,
    /// Whether a 206 actually covers the entire representation (spec.md
    /// §4.3: "206-with-full-range"), derived from `Content-Range: bytes
    /// start-end/total`. Irrelevant for any other status.
    pub full_range: bool,
}

/// Parses a `Content-Range: bytes start-end/total` header and reports
/// whether the covered range is the entire resource (`start == 0` and
/// `end + 1 == total`). Any other shape (missing header, `total` of `*`,
/// a genuine partial range) is not a full range.
pub fn is_full_content_range(content_range: Option<&str>) -> bool {
    let Some(value) = content_range else { return false };
    let Some(rest) = value.trim().strip_prefix("bytes ") else { return false };
    let Some((range, total)) = rest.split_once('/') else { return false };
    let Some((start, end)) = range.split_once('-') else { return false };
    let Ok(start) = start.trim().parse::<u64>() else { return false };
    let Ok(end) = end.trim().parse::<u64>() else { return false };
    let Ok(total) = total.trim().parse::<u64>() else { return false };
    start == 0 && end + 1 == total
}

fn cache_control_forbids(cache_control: Option<&str>) -> bool {
    match cache_control {
        Some(value) => {
            let lower = value.to_ascii_lowercase();
            lower.split(',').any(|directive| {
                let directive = directive.trim();
                directive == "no-store" || directive == "private"
            })
        }
        None => false,
    }
}

/// `Vary` is acceptable only if it names nothing beyond `Accept` /
/// `Accept-Encoding` (spec.md §4.3, §4.2 "Adaptive image format").
fn vary_within_bounds(vary: Option<&str>) -> bool {
    match vary {
        None => true,
        Some(value) => value.split(',').all(|name| {
            let name = name.trim().to_ascii_lowercase();
            name.is_empty() || name == "accept" || name == "accept-encoding"
        }),
    }
}

pub fn is_cacheable(policy: &CachePolicy, resp: &ResponseFacts<'_>) -> bool {
    if !policy.enabled {
        return false;
    }
    if !matches!(resp.method, Method::Get | Method::Head) {
        return false;
    }
    let status_ok = match resp.status {
        200 | 304 => true,
        206 => resp.full_range,
        _ => false,
    };
    if !status_ok {
        return false;
    }
    let ext_ok = resp
        .extension
        .map(|ext| policy.cacheable_extensions.iter().any(|e| e == ext))
        .unwrap_or(false);
    if !ext_ok {
        return false;
    }
    if let Some(len) = resp.content_length {
        if let Some(min) = policy.min_size {
            if len < min {
                return false;
            }
        }
        if let Some(max) = policy.max_size {
            if len > max {
                return false;
            }
        }
    }
    if cache_control_forbids(resp.cache_control) {
        return false;
    }
    if !vary_within_bounds(resp.vary) {
        return false;
    }
    true
}
