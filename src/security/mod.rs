//! Security Gate (spec.md §4.6).

pub mod ban;
pub mod gate;

pub use ban::BannedIP;
pub use gate::{Decision, SecurityGate, SecurityGateConfig};
