//! PathRule / ExtensionRule — the routing table's data model (spec.md §3).

use url::Url;

use crate::error::ConfigError;

/// A size range where either bound may be unbounded (`None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeRange {
    pub min_bytes: Option<u64>,
    pub max_bytes: Option<u64>,
}

impl SizeRange {
    pub const UNBOUNDED: SizeRange = SizeRange {
        min_bytes: None,
        max_bytes: None,
    };

    pub fn new(min_bytes: Option<u64>, max_bytes: Option<u64>) -> Result<Self, ConfigError> {
        if let (Some(min), Some(max)) = (min_bytes, max_bytes) {
            if min > max {
                return Err(ConfigError::InvertedSizeRange {
                    rule: String::new(),
                    min,
                    max,
                });
            }
        }
        Ok(SizeRange {
            min_bytes,
            max_bytes,
        })
    }

    /// Whether this range has any finite bound at all (§4.1 step 4/7).
    pub fn is_bounded(&self) -> bool {
        self.min_bytes.is_some() || self.max_bytes.is_some()
    }

    /// Does the range contain a known size?
    pub fn contains(&self, size: u64) -> bool {
        if let Some(min) = self.min_bytes {
            if size < min {
                return false;
            }
        }
        if let Some(max) = self.max_bytes {
            if size > max {
                return false;
            }
        }
        true
    }

    /// §4.1: "any rule requiring a size and getting an unknown falls through
    /// to the next... selects the first candidate whose range includes
    /// 'unknown' (i.e. has no min)".
    pub fn accepts_unknown(&self) -> bool {
        self.min_bytes.is_none()
    }
}

/// One refinement within a `PathRule` (spec.md §3).
#[derive(Debug, Clone)]
pub struct ExtensionRule {
    /// Lowercase extensions, no leading dot.
    pub extensions: Vec<String>,
    pub target: Url,
    pub size: SizeRange,
    /// Empty == applies to all hosts.
    pub hosts: Vec<String>,
    pub redirect: bool,
}

impl ExtensionRule {
    pub fn matches_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }

    pub fn matches_host(&self, host: Option<&str>) -> bool {
        if self.hosts.is_empty() {
            return true;
        }
        match host {
            Some(h) => self.hosts.iter().any(|allowed| allowed == h),
            None => false,
        }
    }
}

/// One mapping entry keyed by path prefix (spec.md §3).
#[derive(Debug, Clone)]
pub struct PathRule {
    pub prefix: String,
    pub default_target: Url,
    pub enabled: bool,
    pub extension_rules: Vec<ExtensionRule>,
}

impl PathRule {
    /// Segment-boundary prefix match: `/b2` matches `/b2` and `/b2/x`, not
    /// `/b2x` (spec.md §4.1, GLOSSARY "Path prefix boundary").
    pub fn matches_path(&self, request_path: &str) -> bool {
        if !request_path.starts_with(self.prefix.as_str()) {
            return false;
        }
        let rest = &request_path[self.prefix.len()..];
        rest.is_empty() || rest.starts_with('/')
    }

    pub fn residual_path<'a>(&self, request_path: &'a str) -> &'a str {
        &request_path[self.prefix.len()..]
    }
}

pub fn validate_no_duplicate_prefixes(rules: &[PathRule]) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for rule in rules {
        if !seen.insert(rule.prefix.as_str()) {
            return Err(ConfigError::DuplicatePrefix(rule.prefix.clone()));
        }
    }
    Ok(())
}
