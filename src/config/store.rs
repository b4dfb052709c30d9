//! Config Store (spec.md §4.5): an atomically replaceable routing table
//! with change-callback fan-out. Replacement is a single pointer swap via
//! `arc_swap::ArcSwap` — grounded in `zhu327-pingsix`'s use of `arc-swap`
//! for its live routing table, generalizing the teacher's startup-only
//! `ServerConf` mutation into something that can be replaced while serving.

use std::sync::{Arc, RwLock};

use arc_swap::ArcSwap;

use crate::config::rule::{validate_no_duplicate_prefixes, PathRule};
use crate::config::schema::{CachePolicy, CompressionPolicy};
use crate::error::ConfigError;

/// One immutable, fully-formed routing table (spec.md §3 "Ownership": "the
/// Config Store exclusively owns the current rule set as one immutable
/// snapshot; readers obtain a reference that remains valid through their
/// request").
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub rules: Arc<Vec<PathRule>>,
    pub cache_policy: Arc<CachePolicy>,
    pub compression_policy: Arc<CompressionPolicy>,
}

impl ConfigSnapshot {
    pub fn empty() -> Self {
        ConfigSnapshot {
            rules: Arc::new(Vec::new()),
            cache_policy: Arc::new(CachePolicy {
                enabled: false,
                ttl_seconds: 0,
                min_size: None,
                max_size: None,
                cacheable_extensions: Vec::new(),
            }),
            compression_policy: Arc::new(CompressionPolicy {
                gzip: true,
                brotli: true,
            }),
        }
    }
}

type ChangeCallback = Box<dyn Fn(&ConfigSnapshot) + Send + Sync>;

/// Validates, then atomically swaps in a new `ConfigSnapshot`, fanning the
/// change out to registered callbacks (spec.md §4.5).
pub struct ConfigStore {
    current: ArcSwap<ConfigSnapshot>,
    callbacks: RwLock<Vec<ChangeCallback>>,
}

impl ConfigStore {
    pub fn new(initial: ConfigSnapshot) -> Self {
        ConfigStore {
            current: ArcSwap::from_pointee(initial),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Cheap, shared reference to the live snapshot (spec.md §4.5
    /// `current()`). No locking on the read path.
    pub fn current(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    /// Register a callback invoked synchronously, after the swap, from the
    /// replacing caller (spec.md §4.5 "Change callbacks"). Callbacks should
    /// not block — they receive a snapshot, never a live handle back into
    /// the store, which is what breaks the Config ↔ callback-target cycle
    /// (spec.md §9 "Cyclic references").
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(&ConfigSnapshot) + Send + Sync + 'static,
    {
        self.callbacks.write().unwrap().push(Box::new(callback));
    }

    /// Validates and replaces the current snapshot. On success, returns the
    /// old snapshot (spec.md §4.5 `replace() -> old_snapshot`). On
    /// validation failure, rejects and the old snapshot remains live
    /// (spec.md §4.5 "Validation", §7 "Config validation failure").
    pub fn replace(&self, snapshot: ConfigSnapshot) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        validate_no_duplicate_prefixes(&snapshot.rules)?;
        for rule in snapshot.rules.iter() {
            for ext in &rule.extension_rules {
                if let (Some(min), Some(max)) = (ext.size.min_bytes, ext.size.max_bytes) {
                    if min > max {
                        return Err(ConfigError::InvertedSizeRange {
                            rule: rule.prefix.clone(),
                            min,
                            max,
                        });
                    }
                }
            }
        }
        if snapshot.cache_policy.ttl_seconds < 0 {
            return Err(ConfigError::NegativeTtl(snapshot.cache_policy.ttl_seconds));
        }

        let old = self.current.swap(Arc::new(snapshot));
        let new = self.current.load_full();
        for cb in self.callbacks.read().unwrap().iter() {
            cb(&new);
        }
        Ok(old)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::rule::{ExtensionRule, SizeRange};
    use url::Url;

    fn snapshot_with(prefixes: &[&str]) -> ConfigSnapshot {
        let rules = prefixes
            .iter()
            .map(|p| PathRule {
                prefix: p.to_string(),
                default_target: Url::parse("https://origin.example").unwrap(),
                enabled: true,
                extension_rules: Vec::new(),
            })
            .collect();
        ConfigSnapshot {
            rules: Arc::new(rules),
            cache_policy: Arc::new(crate::config::schema::CachePolicy {
                enabled: false,
                ttl_seconds: 0,
                min_size: None,
                max_size: None,
                cacheable_extensions: Vec::new(),
            }),
            compression_policy: Arc::new(crate::config::schema::CompressionPolicy {
                gzip: true,
                brotli: true,
            }),
        }
    }

    #[test]
    fn replace_swaps_and_returns_old() {
        let store = ConfigStore::new(ConfigSnapshot::empty());
        let old = store.replace(snapshot_with(&["/b2"])).unwrap();
        assert!(old.rules.is_empty());
        assert_eq!(store.current().rules.len(), 1);
    }

    #[test]
    fn replace_rejects_duplicate_prefixes_and_keeps_old() {
        let store = ConfigStore::new(snapshot_with(&["/a"]));
        let err = store.replace(snapshot_with(&["/b2", "/b2"]));
        assert!(err.is_err());
        assert_eq!(store.current().rules[0].prefix, "/a");
    }

    #[test]
    fn replace_rejects_inverted_size_range() {
        let mut snap = snapshot_with(&["/b2"]);
        let rules = Arc::get_mut(&mut snap.rules).unwrap();
        rules[0].extension_rules.push(ExtensionRule {
            extensions: vec!["jpg".to_string()],
            target: Url::parse("https://img.example").unwrap(),
            size: SizeRange {
                min_bytes: Some(100),
                max_bytes: Some(50),
            },
            hosts: Vec::new(),
            redirect: false,
        });
        let store = ConfigStore::new(ConfigSnapshot::empty());
        assert!(store.replace(snap).is_err());
    }

    #[test]
    fn on_change_fires_after_swap() {
        let store = ConfigStore::new(ConfigSnapshot::empty());
        let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen2 = seen.clone();
        store.on_change(move |snap| {
            seen2.store(snap.rules.len(), std::sync::atomic::Ordering::SeqCst);
        });
        store.replace(snapshot_with(&["/a", "/b"])).unwrap();
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
