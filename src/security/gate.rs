//! Security Gate (spec.md §4.6), grounded in the teacher's `limiter.rs`
//! (`pingora_limits::rate::Rate` sliding window, `Rate::observe`) but
//! counting error responses per client IP instead of requests per API key,
//! and backed by a copy-on-write ban list (spec.md §5 "Ban list:
//! copy-on-write; small").

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use pingora_limits::rate::Rate;

use crate::security::ban::BannedIP;

#[derive(Debug, Clone, Copy)]
pub enum Decision {
    Allow,
    Deny(u16),
}

pub struct SecurityGateConfig {
    pub window: Duration,
    pub error_threshold: isize,
    pub ban_duration_secs: i64,
}

impl Default for SecurityGateConfig {
    fn default() -> Self {
        SecurityGateConfig {
            window: Duration::from_secs(60),
            error_threshold: 20,
            ban_duration_secs: 300,
        }
    }
}

/// `preauthorize`/`observe` contract (spec.md §4.6). The sliding window is
/// the teacher's `Rate` type; the ban list is a whole-map copy-on-write
/// structure swapped via `arc_swap`, mirroring `config::store::ConfigStore`'s
/// snapshot-replace pattern at a smaller scale.
pub struct SecurityGate {
    config: SecurityGateConfig,
    error_rate: Rate,
    bans: ArcSwap<HashMap<IpAddr, BannedIP>>,
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl SecurityGate {
    pub fn new(config: SecurityGateConfig) -> Self {
        SecurityGate {
            error_rate: Rate::new(config.window),
            config,
            bans: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Seeds bans loaded from the sync collaborator at startup (spec.md
    /// §4.6 "Persistence contract").
    pub fn load_bans(&self, bans: Vec<BannedIP>) {
        let map = bans.into_iter().map(|b| (b.address, b)).collect();
        self.bans.store(Arc::new(map));
    }

    /// spec.md §4.6 `preauthorize(request) -> allow | deny(status)`.
    /// Banned IPs are rejected with 403 without consulting the Resolver.
    pub fn preauthorize(&self, client_ip: IpAddr) -> Decision {
        let bans = self.bans.load();
        match bans.get(&client_ip) {
            Some(ban) if ban.is_active(now_unix()) => Decision::Deny(403),
            _ => Decision::Allow,
        }
    }

    /// spec.md §4.6 `observe(request, status)`. Counts 4xx/5xx toward the
    /// sliding window; bans the IP when the threshold is exceeded.
    pub fn observe(&self, client_ip: IpAddr, status: u16) {
        if status < 400 {
            return;
        }
        let key = client_ip.to_string();
        let count = self.error_rate.observe(&key, 1);
        if count > self.config.error_threshold {
            self.ban(client_ip, count as u64, "error rate threshold exceeded".to_string());
        }
    }

    fn ban(&self, client_ip: IpAddr, error_count_at_ban: u64, reason: String) {
        let ban = BannedIP::new(client_ip, now_unix(), self.config.ban_duration_secs, reason, error_count_at_ban);
        let mut next = (**self.bans.load()).clone();
        next.insert(client_ip, ban);
        self.bans.store(Arc::new(next));
    }

    pub fn unban(&self, client_ip: IpAddr, reason: String) {
        let mut next = (**self.bans.load()).clone();
        if let Some(ban) = next.get_mut(&client_ip) {
            ban.unban(now_unix(), reason);
            self.bans.store(Arc::new(next));
        }
    }

    pub fn active_bans(&self) -> Vec<BannedIP> {
        self.bans
            .load()
            .values()
            .filter(|b| b.is_active(now_unix()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7))
    }

    #[test]
    fn allows_unknown_ip() {
        let gate = SecurityGate::new(SecurityGateConfig::default());
        assert!(matches!(gate.preauthorize(ip()), Decision::Allow));
    }

    #[test]
    fn bans_after_error_threshold_exceeded() {
        let gate = SecurityGate::new(SecurityGateConfig {
            window: Duration::from_secs(60),
            error_threshold: 3,
            ban_duration_secs: 60,
        });
        for _ in 0..4 {
            gate.observe(ip(), 500);
        }
        assert!(matches!(gate.preauthorize(ip()), Decision::Deny(403)));
    }

    #[test]
    fn success_responses_never_count_toward_ban() {
        let gate = SecurityGate::new(SecurityGateConfig {
            window: Duration::from_secs(60),
            error_threshold: 1,
            ban_duration_secs: 60,
        });
        for _ in 0..10 {
            gate.observe(ip(), 200);
        }
        assert!(matches!(gate.preauthorize(ip()), Decision::Allow));
    }

    #[test]
    fn manual_unban_restores_access() {
        let gate = SecurityGate::new(SecurityGateConfig {
            window: Duration::from_secs(60),
            error_threshold: 1,
            ban_duration_secs: 600,
        });
        gate.observe(ip(), 500);
        gate.observe(ip(), 500);
        assert!(matches!(gate.preauthorize(ip()), Decision::Deny(403)));
        gate.unban(ip(), "appeal approved".into());
        assert!(matches!(gate.preauthorize(ip()), Decision::Allow));
    }
}
