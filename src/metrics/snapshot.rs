//! `snapshot()` output (spec.md §4.4 "Snapshot"): derived rates computed
//! from the atomics read at walk time, plus a partially-sorted top-N.

use std::sync::atomic::Ordering;

use crate::metrics::collector::PathCounters;
use crate::metrics::histogram::BUCKET_LABELS;

#[derive(Debug, Clone)]
pub struct PathSnapshot {
    pub prefix: String,
    pub request_count: u64,
    pub error_count: u64,
    pub bytes_transferred: u64,
    pub status_2xx: u64,
    pub status_3xx: u64,
    pub status_4xx: u64,
    pub status_5xx: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub bytes_saved: u64,
    pub latency_sum_ns: u64,
    pub last_access_unix: i64,
}

impl PathSnapshot {
    pub fn from_counters(prefix: String, counters: &PathCounters) -> Self {
        PathSnapshot {
            prefix,
            request_count: counters.request_count.load(Ordering::Relaxed),
            error_count: counters.error_count.load(Ordering::Relaxed),
            bytes_transferred: counters.bytes_transferred.load(Ordering::Relaxed),
            status_2xx: counters.status_2xx.load(Ordering::Relaxed),
            status_3xx: counters.status_3xx.load(Ordering::Relaxed),
            status_4xx: counters.status_4xx.load(Ordering::Relaxed),
            status_5xx: counters.status_5xx.load(Ordering::Relaxed),
            cache_hits: counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: counters.cache_misses.load(Ordering::Relaxed),
            bytes_saved: counters.bytes_saved.load(Ordering::Relaxed),
            latency_sum_ns: counters.latency_sum_ns.load(Ordering::Relaxed),
            last_access_unix: counters.last_access_unix.load(Ordering::Relaxed),
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.request_count as f64
        }
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let attempts = self.cache_hits + self.cache_misses;
        if attempts == 0 {
            0.0
        } else {
            self.cache_hits as f64 / attempts as f64
        }
    }

    pub fn avg_latency_ns(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.latency_sum_ns as f64 / self.request_count as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct LatencyHistogramSnapshot {
    pub labels: [&'static str; 5],
    pub counts: [u64; 5],
    pub min_ns: u64,
    pub max_ns: u64,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub paths: Vec<PathSnapshot>,
    pub latency: LatencyHistogramSnapshot,
    pub bandwidth_by_minute: Vec<(String, u64)>,
    pub uptime_secs: f64,
    pub total_requests: u64,
    pub total_errors: u64,
    pub total_bytes: u64,
    pub bytes_per_second: f64,
}

impl Snapshot {
    pub fn build(
        paths: Vec<PathSnapshot>,
        latency_counts: [u64; 5],
        bandwidth_by_minute: Vec<(String, u64)>,
        min_ns: u64,
        max_ns: u64,
        uptime_secs: f64,
    ) -> Self {
        let total_requests = paths.iter().map(|p| p.request_count).sum();
        let total_errors = paths.iter().map(|p| p.error_count).sum();
        let total_bytes = paths.iter().map(|p| p.bytes_transferred).sum();
        Snapshot {
            paths,
            latency: LatencyHistogramSnapshot {
                labels: BUCKET_LABELS,
                counts: latency_counts,
                min_ns: if min_ns == u64::MAX { 0 } else { min_ns },
                max_ns,
            },
            bandwidth_by_minute,
            uptime_secs,
            total_requests,
            total_errors,
            total_bytes,
            bytes_per_second: total_bytes as f64 / uptime_secs,
        }
    }

    /// Top-N paths by request_count descending, path ascending on tie
    /// (spec.md §4.4 "Snapshot").
    pub fn top_n(&self, n: usize) -> Vec<&PathSnapshot> {
        let mut sorted: Vec<&PathSnapshot> = self.paths.iter().collect();
        sorted.sort_by(|a, b| {
            b.request_count
                .cmp(&a.request_count)
                .then_with(|| a.prefix.cmp(&b.prefix))
        });
        sorted.truncate(n);
        sorted
    }
}
