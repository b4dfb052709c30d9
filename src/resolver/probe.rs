//! §4.1 step 4: "a conditional HEAD-like probe to the default target ...
//! cached per URL for a short TTL ... to avoid duplicating work across
//! near-simultaneous requests." Same single-flight shape as the Response
//! Cache's `CacheLock` (spec.md §9 "Probe-and-size coupling"), applied to a
//! much cheaper resource: a `scc::HashMap` index plus a per-key
//! `tokio::sync::Mutex` so concurrent probes for the same URL serialize
//! instead of duplicating upstream work.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use url::Url;

/// Speculative size lookup, implemented by the Proxy Engine against a real
/// upstream connection. Kept as a trait so the probe cache's TTL/
/// single-flight behavior is testable with a fake.
#[async_trait]
pub trait SizeProber: Send + Sync {
    /// `None` on probe failure — treated as "unknown", never fatal
    /// (spec.md §4.1 "Failure semantics", §7 "Probe failure").
    async fn probe_size(&self, url: &Url) -> Option<u64>;
}

#[derive(Clone, Copy)]
struct ProbeEntry {
    size: Option<u64>,
    fetched_at: Instant,
}

pub struct ProbeCache {
    entries: scc::HashMap<String, ProbeEntry>,
    locks: scc::HashMap<String, Arc<tokio::sync::Mutex<()>>>,
    ttl: Duration,
}

impl ProbeCache {
    pub fn new(ttl: Duration) -> Self {
        ProbeCache {
            entries: scc::HashMap::new(),
            locks: scc::HashMap::new(),
            ttl,
        }
    }

    async fn fresh(&self, key: &str) -> Option<Option<u64>> {
        if let Some(entry) = self.entries.get_async(key).await {
            let e = *entry.get();
            if e.fetched_at.elapsed() < self.ttl {
                return Some(e.size);
            }
        }
        None
    }

    async fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        if let Some(existing) = self.locks.get_async(key).await {
            return existing.get().clone();
        }
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        match self.locks.insert_async(key.to_string(), lock.clone()).await {
            Ok(()) => lock,
            Err(_) => self
                .locks
                .get_async(key)
                .await
                .map(|e| e.get().clone())
                .unwrap_or(lock),
        }
    }

    /// Returns the probed size (or `None` if probing failed / size is
    /// unknown), probing at most once per URL per TTL window even under
    /// concurrent callers.
    pub async fn get_or_probe(&self, url: &Url, prober: &dyn SizeProber) -> Option<u64> {
        let key = url.as_str().to_string();
        if let Some(size) = self.fresh(&key).await {
            return size;
        }

        let lock = self.lock_for(&key).await;
        let _guard = lock.lock().await;
        // Re-check: another waiter may have just populated it.
        if let Some(size) = self.fresh(&key).await {
            return size;
        }

        let size = prober.probe_size(url).await;
        let entry = ProbeEntry {
            size,
            fetched_at: Instant::now(),
        };
        if self.entries.insert_async(key.clone(), entry).await.is_err() {
            let _ = self.entries.update_async(&key, |_, v| *v = entry).await;
        }
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProber {
        calls: AtomicUsize,
        size: Option<u64>,
    }

    #[async_trait]
    impl SizeProber for CountingProber {
        async fn probe_size(&self, _url: &Url) -> Option<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.size
        }
    }

    #[tokio::test]
    async fn caches_within_ttl() {
        let cache = ProbeCache::new(Duration::from_secs(60));
        let prober = CountingProber {
            calls: AtomicUsize::new(0),
            size: Some(1200),
        };
        let url = Url::parse("https://origin.example/a.jpg").unwrap();
        assert_eq!(cache.get_or_probe(&url, &prober).await, Some(1200));
        assert_eq!(cache.get_or_probe(&url, &prober).await, Some(1200));
        assert_eq!(prober.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn probe_failure_yields_none_without_panicking() {
        let cache = ProbeCache::new(Duration::from_secs(60));
        let prober = CountingProber {
            calls: AtomicUsize::new(0),
            size: None,
        };
        let url = Url::parse("https://origin.example/missing.jpg").unwrap();
        assert_eq!(cache.get_or_probe(&url, &prober).await, None);
    }

    #[tokio::test]
    async fn concurrent_probes_for_same_url_single_flight() {
        let cache = Arc::new(ProbeCache::new(Duration::from_secs(60)));
        let prober = Arc::new(CountingProber {
            calls: AtomicUsize::new(0),
            size: Some(42),
        });
        let url = Arc::new(Url::parse("https://origin.example/x.png").unwrap());

        let mut handles = Vec::new();
        for _ in 0..20 {
            let cache = cache.clone();
            let prober = prober.clone();
            let url = url.clone();
            handles.push(tokio::spawn(async move {
                cache.get_or_probe(&url, prober.as_ref()).await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap(), Some(42));
        }
        assert_eq!(prober.calls.load(Ordering::SeqCst), 1);
    }
}
