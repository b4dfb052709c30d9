//! Proxy Engine (spec.md §4.2).

pub mod bucket;
pub mod compression;
pub mod ctx;
pub mod engine;
pub mod headers;
pub mod request;
pub mod streaming;

pub use engine::{GatewayEngine, Timeouts};
