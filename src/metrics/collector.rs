//! Metrics Collector (spec.md §4.4): wait-free `record` on the hot path,
//! per-prefix counters in a concurrent map keyed by the matched PathRule
//! prefix (bounding cardinality to the configured rule count), global
//! status-class / latency / byte counters as fixed-layout atomics.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::bandwidth::BandwidthWindow;
use crate::metrics::histogram::LatencyBucket;
use crate::metrics::snapshot::{PathSnapshot, Snapshot};

#[derive(Debug, Default)]
pub struct PathCounters {
    pub request_count: AtomicU64,
    pub error_count: AtomicU64,
    pub bytes_transferred: AtomicU64,
    pub status_2xx: AtomicU64,
    pub status_3xx: AtomicU64,
    pub status_4xx: AtomicU64,
    pub status_5xx: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub bytes_saved: AtomicU64,
    pub latency_sum_ns: AtomicU64,
    pub last_access_unix: AtomicI64,
}

impl PathCounters {
    fn reset(&self) {
        self.request_count.store(0, Ordering::Relaxed);
        self.error_count.store(0, Ordering::Relaxed);
        self.bytes_transferred.store(0, Ordering::Relaxed);
        self.status_2xx.store(0, Ordering::Relaxed);
        self.status_3xx.store(0, Ordering::Relaxed);
        self.status_4xx.store(0, Ordering::Relaxed);
        self.status_5xx.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.bytes_saved.store(0, Ordering::Relaxed);
        self.latency_sum_ns.store(0, Ordering::Relaxed);
        self.last_access_unix.store(0, Ordering::Relaxed);
    }
}

/// Same segment-boundary rule as routing (spec.md §4.4 "Reset semantics",
/// §GLOSSARY "Path prefix boundary").
fn prefix_boundary_match(key: &str, prefix: &str) -> bool {
    if !key.starts_with(prefix) {
        return false;
    }
    let rest = &key[prefix.len()..];
    rest.is_empty() || rest.starts_with('/')
}

/// Whether caching applied to a request at all, and if so, how it went
/// (spec.md §3 invariant: "cache_hits + cache_misses ≤ request_count — not
/// all requests are cacheable"). `NotApplicable` is the third outcome that
/// invariant requires room for — a plain bool can't represent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
    NotApplicable,
}

fn status_class(status: u16) -> usize {
    match status {
        200..=299 => 0,
        300..=399 => 1,
        400..=499 => 2,
        _ => 3,
    }
}

pub struct MetricsCollector {
    paths: scc::HashMap<String, Arc<PathCounters>>,
    latency_buckets: LatencyBucket,
    bandwidth: BandwidthWindow,
    latency_min_ns: AtomicU64,
    latency_max_ns: AtomicU64,
    started_at: Instant,
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl MetricsCollector {
    pub fn new() -> Self {
        MetricsCollector {
            paths: scc::HashMap::new(),
            latency_buckets: LatencyBucket::new(),
            bandwidth: BandwidthWindow::new(now_unix()),
            latency_min_ns: AtomicU64::new(u64::MAX),
            latency_max_ns: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    async fn counters_for(&self, path_prefix: &str) -> Arc<PathCounters> {
        if let Some(existing) = self.paths.get_async(path_prefix).await {
            return existing.get().clone();
        }
        let fresh = Arc::new(PathCounters::default());
        match self.paths.insert_async(path_prefix.to_string(), fresh.clone()).await {
            Ok(()) => fresh,
            Err(_) => self
                .paths
                .get_async(path_prefix)
                .await
                .map(|e| e.get().clone())
                .unwrap_or(fresh),
        }
    }

    fn observe_latency_extrema(&self, latency_ns: u64) {
        let mut current = self.latency_min_ns.load(Ordering::Relaxed);
        while latency_ns < current {
            match self.latency_min_ns.compare_exchange_weak(
                current,
                latency_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        let mut current = self.latency_max_ns.load(Ordering::Relaxed);
        while latency_ns > current {
            match self.latency_max_ns.compare_exchange_weak(
                current,
                latency_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// spec.md §4.4 `record(path_prefix, status, latency, bytes, client_ip,
    /// cache_outcome, bytes_saved)`. `client_ip` is accepted for interface
    /// parity with the Security Gate's own per-IP accounting but is not
    /// itself retained here — `PathMetrics` (spec.md §3) carries no
    /// per-client fields.
    pub async fn record(
        &self,
        path_prefix: &str,
        status: u16,
        latency_ns: u64,
        bytes: u64,
        _client_ip: std::net::IpAddr,
        cache_outcome: CacheOutcome,
        bytes_saved: u64,
    ) {
        let counters = self.counters_for(path_prefix).await;
        counters.request_count.fetch_add(1, Ordering::Relaxed);
        if status >= 400 {
            counters.error_count.fetch_add(1, Ordering::Relaxed);
        }
        counters.bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
        match status_class(status) {
            0 => counters.status_2xx.fetch_add(1, Ordering::Relaxed),
            1 => counters.status_3xx.fetch_add(1, Ordering::Relaxed),
            2 => counters.status_4xx.fetch_add(1, Ordering::Relaxed),
            _ => counters.status_5xx.fetch_add(1, Ordering::Relaxed),
        };
        match cache_outcome {
            CacheOutcome::Hit => {
                counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                counters.bytes_saved.fetch_add(bytes_saved, Ordering::Relaxed);
            }
            CacheOutcome::Miss => {
                counters.cache_misses.fetch_add(1, Ordering::Relaxed);
            }
            CacheOutcome::NotApplicable => {}
        }
        counters.latency_sum_ns.fetch_add(latency_ns, Ordering::Relaxed);
        counters.last_access_unix.store(now_unix(), Ordering::Relaxed);

        self.latency_buckets.observe(latency_ns / 1_000_000);
        self.observe_latency_extrema(latency_ns);
        self.bandwidth.record(now_unix(), bytes);
    }

    /// spec.md §4.4 "Reset semantics": zeroes every counter whose key is
    /// `prefix` or begins with `prefix/`, O(N) in the map, non-blocking for
    /// concurrent reads.
    pub async fn reset(&self, prefix: &str) {
        self.paths
            .scan_async(|key, counters| {
                if prefix_boundary_match(key, prefix) {
                    counters.reset();
                }
            })
            .await;
    }

    /// spec.md §4.4 "Snapshot": an eventually-consistent read; derived
    /// fields computed from the atomics read at walk time.
    pub async fn snapshot(&self) -> Snapshot {
        let mut paths = Vec::new();
        self.paths
            .scan_async(|key, counters| {
                paths.push(PathSnapshot::from_counters(key.clone(), counters));
            })
            .await;

        let uptime_secs = self.started_at.elapsed().as_secs_f64().max(1e-9);
        let now = now_unix();
        Snapshot::build(
            paths,
            self.latency_buckets.counts(),
            self.bandwidth.snapshot(now),
            self.latency_min_ns.load(Ordering::Relaxed),
            self.latency_max_ns.load(Ordering::Relaxed),
            uptime_secs,
        )
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
    }

    #[tokio::test]
    async fn record_updates_counters() {
        let collector = MetricsCollector::new();
        collector
            .record("/b2", 200, 5_000_000, 1024, ip(), CacheOutcome::NotApplicable, 0)
            .await;
        collector
            .record("/b2", 404, 1_000_000, 0, ip(), CacheOutcome::NotApplicable, 0)
            .await;
        let snap = collector.snapshot().await;
        let p = snap.paths.iter().find(|p| p.prefix == "/b2").unwrap();
        assert_eq!(p.request_count, 2);
        assert_eq!(p.error_count, 1);
        assert_eq!(p.status_2xx, 1);
        assert_eq!(p.status_4xx, 1);
    }

    #[tokio::test]
    async fn cache_hit_accounting() {
        let collector = MetricsCollector::new();
        collector
            .record("/b2", 200, 1_000_000, 2048, ip(), CacheOutcome::Hit, 2048)
            .await;
        let snap = collector.snapshot().await;
        let p = snap.paths.iter().find(|p| p.prefix == "/b2").unwrap();
        assert_eq!(p.cache_hits, 1);
        assert_eq!(p.cache_misses, 0);
        assert_eq!(p.bytes_saved, 2048);
    }

    #[tokio::test]
    async fn cache_not_applicable_increments_neither_hits_nor_misses() {
        let collector = MetricsCollector::new();
        collector
            .record("/b2", 200, 1_000_000, 512, ip(), CacheOutcome::NotApplicable, 0)
            .await;
        let snap = collector.snapshot().await;
        let p = snap.paths.iter().find(|p| p.prefix == "/b2").unwrap();
        assert_eq!(p.request_count, 1);
        assert_eq!(p.cache_hits, 0);
        assert_eq!(p.cache_misses, 0);
    }

    #[tokio::test]
    async fn reset_zeroes_only_matching_prefix() {
        let collector = MetricsCollector::new();
        collector
            .record("/b2", 200, 1_000_000, 1, ip(), CacheOutcome::NotApplicable, 0)
            .await;
        collector
            .record("/b2x", 200, 1_000_000, 1, ip(), CacheOutcome::NotApplicable, 0)
            .await;
        collector.reset("/b2").await;
        let snap = collector.snapshot().await;
        let b2 = snap.paths.iter().find(|p| p.prefix == "/b2").unwrap();
        let b2x = snap.paths.iter().find(|p| p.prefix == "/b2x").unwrap();
        assert_eq!(b2.request_count, 0);
        assert_eq!(b2x.request_count, 1);
    }

    #[tokio::test]
    async fn invariants_hold_under_concurrent_records() {
        let collector = Arc::new(MetricsCollector::new());
        let mut handles = Vec::new();
        for i in 0..200 {
            let collector = collector.clone();
            let status = if i % 5 == 0 { 500 } else { 200 };
            let outcome = if i % 2 == 0 { CacheOutcome::Hit } else { CacheOutcome::Miss };
            handles.push(tokio::spawn(async move {
                collector.record("/p", status, 1_000_000, 10, ip(), outcome, 10).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let snap = collector.snapshot().await;
        let p = snap.paths.iter().find(|p| p.prefix == "/p").unwrap();
        assert_eq!(p.request_count, 200);
        assert!(p.error_count <= p.request_count);
        assert_eq!(p.status_2xx + p.status_5xx, p.request_count);
        assert!(p.cache_hits + p.cache_misses <= p.request_count);
    }
}
