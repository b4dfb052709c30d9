//! The literal on-disk JSON shape (spec.md §6: "top-level keys include MAP
//! ..., Compression ..., Cache ..."). This is the boundary where dynamic,
//! loosely-typed config blobs get validated into the strongly typed
//! `PathRule` set the core actually runs on (spec.md §9, "Dynamic-typed
//! config blobs must round-trip through a schema").
//!
//! In production the sync collaborator owns parsing this file and calls
//! `ConfigStore::replace` with the already-typed result (spec.md §6); the
//! conversion here is the same validation step, just invoked locally for
//! dev runs and tests instead of by a remote process.

use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

use crate::config::rule::{ExtensionRule, PathRule, SizeRange};
use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
pub struct RawConfig {
    #[serde(rename = "MAP")]
    pub map: HashMap<String, RawPathRule>,
    #[serde(rename = "Compression", default)]
    pub compression: RawCompression,
    #[serde(rename = "Cache", default)]
    pub cache: RawCacheConfig,
}

#[derive(Debug, Deserialize)]
pub struct RawPathRule {
    #[serde(rename = "DefaultTarget")]
    pub default_target: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, rename = "Extensions")]
    pub extensions: Vec<RawExtensionRule>,
}

#[derive(Debug, Deserialize)]
pub struct RawExtensionRule {
    pub exts: Vec<String>,
    pub target: String,
    #[serde(default)]
    pub min: Option<u64>,
    #[serde(default)]
    pub max: Option<u64>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub redirect: bool,
}

#[derive(Debug, Deserialize)]
pub struct RawCompression {
    #[serde(default)]
    pub gzip: bool,
    #[serde(default)]
    pub brotli: bool,
    #[serde(default)]
    pub level: Option<u32>,
}

impl Default for RawCompression {
    fn default() -> Self {
        RawCompression {
            gzip: true,
            brotli: true,
            level: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawCacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub ttl_seconds: i64,
    #[serde(default)]
    pub min_size: Option<u64>,
    #[serde(default)]
    pub max_size: Option<u64>,
    #[serde(default)]
    pub cacheable_extensions: Vec<String>,
}

impl Default for RawCacheConfig {
    fn default() -> Self {
        RawCacheConfig {
            enabled: false,
            ttl_seconds: 0,
            min_size: None,
            max_size: None,
            cacheable_extensions: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Resolved cache policy, kept alongside the rule set (used to populate
/// `ResolvedTarget::cache_policy`, spec.md §3).
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub enabled: bool,
    pub ttl_seconds: i64,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub cacheable_extensions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CompressionPolicy {
    pub gzip: bool,
    pub brotli: bool,
}

impl TryFrom<RawConfig> for (Vec<PathRule>, CachePolicy, CompressionPolicy) {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, ConfigError> {
        if raw.cache.ttl_seconds < 0 {
            return Err(ConfigError::NegativeTtl(raw.cache.ttl_seconds));
        }

        let mut rules = Vec::with_capacity(raw.map.len());
        for (prefix, raw_rule) in raw.map {
            let default_target =
                Url::parse(&raw_rule.default_target).map_err(|source| ConfigError::BadTargetUrl {
                    rule: prefix.clone(),
                    source,
                })?;

            let mut extension_rules = Vec::with_capacity(raw_rule.extensions.len());
            for raw_ext in raw_rule.extensions {
                let target = Url::parse(&raw_ext.target).map_err(|source| ConfigError::BadTargetUrl {
                    rule: prefix.clone(),
                    source,
                })?;
                let size = SizeRange::new(raw_ext.min, raw_ext.max).map_err(|_| {
                    ConfigError::InvertedSizeRange {
                        rule: prefix.clone(),
                        min: raw_ext.min.unwrap_or_default(),
                        max: raw_ext.max.unwrap_or_default(),
                    }
                })?;
                extension_rules.push(ExtensionRule {
                    extensions: raw_ext
                        .exts
                        .into_iter()
                        .map(|e| e.to_ascii_lowercase())
                        .collect(),
                    target,
                    size,
                    hosts: raw_ext
                        .domains
                        .into_iter()
                        .map(|d| d.to_ascii_lowercase())
                        .collect(),
                    redirect: raw_ext.redirect,
                });
            }

            rules.push(PathRule {
                prefix,
                default_target,
                enabled: raw_rule.enabled,
                extension_rules,
            });
        }

        let cache_policy = CachePolicy {
            enabled: raw.cache.enabled,
            ttl_seconds: raw.cache.ttl_seconds,
            min_size: raw.cache.min_size,
            max_size: raw.cache.max_size,
            cacheable_extensions: raw
                .cache
                .cacheable_extensions
                .into_iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        };
        let compression_policy = CompressionPolicy {
            gzip: raw.compression.gzip,
            brotli: raw.compression.brotli,
        };

        Ok((rules, cache_policy, compression_policy))
    }
}
