//! Metrics Collector (spec.md §4.4).

pub mod bandwidth;
pub mod collector;
pub mod histogram;
pub mod snapshot;

pub use collector::{CacheOutcome, MetricsCollector};
pub use snapshot::Snapshot;
