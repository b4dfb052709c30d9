//! Sync collaborator contract (spec.md §6 "Sync collaborator"): out of
//! scope to implement (it owns the remote columnar store and the on-disk
//! config file), but the core depends on this shape to push metrics and
//! ban events and to receive `replace` calls. Named by what it does, not by
//! a transport — no Consul/Redis-specific surface, unlike the teacher's
//! `discovery.rs`/`rs-consul` integration, which this generalizes away
//! from (spec.md §1 "Out of scope": "the columnar remote-sync client").

use async_trait::async_trait;

use crate::config::ConfigSnapshot;
use crate::metrics::Snapshot;
use crate::security::BannedIP;

/// One-directional callback surface the core drives; the collaborator never
/// holds a live handle back into the core (spec.md §9 "Cyclic references").
#[async_trait]
pub trait SyncCollaborator: Send + Sync {
    /// Periodic push of metrics + ban state to the remote store.
    async fn push_metrics(&self, snapshot: &Snapshot);

    /// Fired when the Security Gate bans or unbans an IP.
    async fn on_ban(&self, ban: &BannedIP);
    async fn on_unban(&self, address: std::net::IpAddr, reason: &str);

    /// Pulled once at startup to seed the Config Store and ban list before
    /// the collaborator's own push loop takes over.
    async fn fetch_initial_config(&self) -> Option<ConfigSnapshot>;
    async fn fetch_initial_bans(&self) -> Vec<BannedIP>;
}

/// Standalone-mode default: config comes only from the local loader
/// (`config::loader`), no remote push, no seeded bans.
pub struct NoopSyncCollaborator;

#[async_trait]
impl SyncCollaborator for NoopSyncCollaborator {
    async fn push_metrics(&self, _snapshot: &Snapshot) {}
    async fn on_ban(&self, _ban: &BannedIP) {}
    async fn on_unban(&self, _address: std::net::IpAddr, _reason: &str) {}
    async fn fetch_initial_config(&self) -> Option<ConfigSnapshot> {
        None
    }
    async fn fetch_initial_bans(&self) -> Vec<BannedIP> {
        Vec::new()
    }
}
