//! `LatencyBucket` (spec.md §3, §4.4 "Latency distribution"): a fixed-layout
//! histogram, bucket selection a branch on milliseconds — never
//! string-keyed on the hot path.

use std::sync::atomic::{AtomicU64, Ordering};

pub const BUCKET_LABELS: [&str; 5] = ["<10ms", "10-50ms", "50-200ms", "200-1000ms", ">1s"];

#[derive(Debug, Default)]
pub struct LatencyBucket {
    buckets: [AtomicU64; 5],
}

fn bucket_index(latency_ms: u64) -> usize {
    match latency_ms {
        0..=9 => 0,
        10..=49 => 1,
        50..=199 => 2,
        200..=999 => 3,
        _ => 4,
    }
}

impl LatencyBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, latency_ms: u64) {
        self.buckets[bucket_index(latency_ms)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self) -> [u64; 5] {
        let mut out = [0u64; 5];
        for (i, b) in self.buckets.iter().enumerate() {
            out[i] = b.load(Ordering::Relaxed);
        }
        out
    }

    pub fn reset(&self) {
        for b in &self.buckets {
            b.store(0, Ordering::Relaxed);
        }
    }
}
