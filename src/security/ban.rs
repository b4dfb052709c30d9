//! `BannedIP` (spec.md §3).

use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct BannedIP {
    pub address: IpAddr,
    pub ban_start_unix: i64,
    pub ban_end_unix: i64,
    pub reason: String,
    pub error_count_at_ban: u64,
    pub active: bool,
    pub unban_unix: Option<i64>,
    pub unban_reason: Option<String>,
}

impl BannedIP {
    pub fn new(address: IpAddr, now_unix: i64, duration_secs: i64, reason: String, error_count_at_ban: u64) -> Self {
        BannedIP {
            address,
            ban_start_unix: now_unix,
            ban_end_unix: now_unix + duration_secs,
            reason,
            error_count_at_ban,
            active: true,
            unban_unix: None,
            unban_reason: None,
        }
    }

    /// Bans auto-expire; expired bans are lazily deactivated on next lookup
    /// (spec.md §4.6).
    pub fn is_active(&self, now_unix: i64) -> bool {
        self.active && self.ban_end_unix > now_unix
    }

    pub fn unban(&mut self, now_unix: i64, reason: String) {
        self.active = false;
        self.unban_unix = Some(now_unix);
        self.unban_reason = Some(reason);
    }
}
