//! Dev/test convenience: parse the on-disk JSON config file directly. In
//! production this is the sync collaborator's job (spec.md §6: "The core
//! consumes the parsed form; it does not read the file itself") — the core
//! only ever sees typed snapshots arriving through `ConfigStore::replace`.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::rule::PathRule;
use crate::config::schema::{CachePolicy, CompressionPolicy, RawConfig};
use crate::config::store::ConfigSnapshot;
use crate::error::ConfigError;

pub fn load_snapshot_from_json_str(contents: &str) -> Result<ConfigSnapshot, ConfigError> {
    let raw: RawConfig = serde_json::from_str(contents)?;
    let (rules, cache_policy, compression_policy): (Vec<PathRule>, CachePolicy, CompressionPolicy) =
        raw.try_into()?;
    Ok(ConfigSnapshot {
        rules: Arc::new(rules),
        cache_policy: Arc::new(cache_policy),
        compression_policy: Arc::new(compression_policy),
    })
}

pub fn load_snapshot_from_file(path: impl AsRef<Path>) -> Result<ConfigSnapshot, ConfigError> {
    let contents = fs::read_to_string(path)?;
    load_snapshot_from_json_str(&contents)
}
