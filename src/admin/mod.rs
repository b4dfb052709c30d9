//! Admin surface contract (spec.md §6 "Admin surface"): the core exposes
//! only these plain operations; an HTTP layer with auth middleware (out of
//! scope here, same as the teacher's `auth.rs` JWT/API-key surface) wraps
//! them under `/admin/api/*`.

use std::sync::Arc;

use crate::cache::{CacheEntry, DiskCache};
use crate::config::{ConfigSnapshot, ConfigStore};
use crate::error::ConfigError;
use crate::metrics::{MetricsCollector, Snapshot};
use crate::security::{BannedIP, SecurityGate};

pub struct AdminOps {
    config_store: Arc<ConfigStore>,
    metrics: Arc<MetricsCollector>,
    security: Arc<SecurityGate>,
    cache: DiskCache,
}

impl AdminOps {
    pub fn new(
        config_store: Arc<ConfigStore>,
        metrics: Arc<MetricsCollector>,
        security: Arc<SecurityGate>,
        cache: DiskCache,
    ) -> Self {
        AdminOps {
            config_store,
            metrics,
            security,
            cache,
        }
    }

    pub fn config_get(&self) -> Arc<ConfigSnapshot> {
        self.config_store.current()
    }

    pub fn config_save(&self, snapshot: ConfigSnapshot) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        self.config_store.replace(snapshot)
    }

    pub async fn metrics_snapshot(&self) -> Snapshot {
        self.metrics.snapshot().await
    }

    pub async fn path_stats_reset(&self, prefix: &str) {
        self.metrics.reset(prefix).await;
    }

    pub fn security_status(&self) -> Vec<BannedIP> {
        self.security.active_bans()
    }

    pub fn security_unban(&self, address: std::net::IpAddr, reason: String) {
        self.security.unban(address, reason);
    }

    pub async fn cache_stats(&self) -> Vec<CacheEntry> {
        self.cache.entries().await
    }

    pub async fn cache_clear(&self) -> usize {
        self.cache.clear().await
    }
}
