//! Bandwidth rolling window (spec.md §4.4 "Bandwidth rolling window"): a
//! coarse one-minute bucket for bytes-per-minute, keyed by `MM-DD HH:MM`;
//! finished buckets freeze into a ring of the last N minutes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const RING_CAPACITY: usize = 60;

fn minute_key(unix_secs: i64) -> String {
    let days = unix_secs.div_euclid(86_400);
    let secs_of_day = unix_secs.rem_euclid(86_400);
    let hh = secs_of_day / 3600;
    let mm = (secs_of_day % 3600) / 60;
    // `days` since epoch is a stable, monotonically increasing key
    // component; we don't need a real calendar date, just a key that's
    // unique per minute-of-process-lifetime and sorts chronologically.
    format!("{days:06}-{hh:02}:{mm:02}")
}

struct Current {
    key: String,
    bytes: AtomicU64,
}

pub struct BandwidthWindow {
    current: Mutex<Current>,
    ring: Mutex<VecDeque<(String, u64)>>,
}

impl BandwidthWindow {
    pub fn new(now_unix: i64) -> Self {
        BandwidthWindow {
            current: Mutex::new(Current {
                key: minute_key(now_unix),
                bytes: AtomicU64::new(0),
            }),
            ring: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)),
        }
    }

    /// Records `bytes` against the current minute, rolling the previous
    /// minute into the ring if time has advanced.
    pub fn record(&self, now_unix: i64, bytes: u64) {
        let key = minute_key(now_unix);
        let current = self.current.lock().unwrap();
        if current.key == key {
            current.bytes.fetch_add(bytes, Ordering::Relaxed);
            return;
        }
        drop(current);

        let mut current = self.current.lock().unwrap();
        if current.key != key {
            let finished_key = std::mem::replace(&mut current.key, key);
            let finished_bytes = current.bytes.swap(0, Ordering::Relaxed);
            let mut ring = self.ring.lock().unwrap();
            if ring.len() == RING_CAPACITY {
                ring.pop_front();
            }
            ring.push_back((finished_key, finished_bytes));
        }
        current.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Last N completed minutes plus the in-progress one, oldest first.
    pub fn snapshot(&self, now_unix: i64) -> Vec<(String, u64)> {
        let mut out: Vec<(String, u64)> = self.ring.lock().unwrap().iter().cloned().collect();
        let current = self.current.lock().unwrap();
        let in_progress_key = minute_key(now_unix);
        if current.key == in_progress_key {
            out.push((current.key.clone(), current.bytes.load(Ordering::Relaxed)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_within_same_minute() {
        let w = BandwidthWindow::new(0);
        w.record(0, 100);
        w.record(30, 200);
        let snap = w.snapshot(30);
        assert_eq!(snap.last().unwrap().1, 300);
    }

    #[test]
    fn rolls_over_on_minute_boundary() {
        let w = BandwidthWindow::new(0);
        w.record(0, 100);
        w.record(70, 50);
        let snap = w.snapshot(70);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].1, 100);
        assert_eq!(snap[1].1, 50);
    }

    #[test]
    fn ring_capped_at_capacity() {
        let w = BandwidthWindow::new(0);
        for i in 0..(RING_CAPACITY as i64 + 5) {
            w.record(i * 60, 1);
        }
        let snap = w.snapshot((RING_CAPACITY as i64 + 5) * 60);
        assert!(snap.len() <= RING_CAPACITY + 1);
    }
}
