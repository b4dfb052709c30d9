//! Config Store (spec.md §3 PathRule/ExtensionRule, §4.5 Config Store).

pub mod loader;
pub mod rule;
pub mod schema;
pub mod store;

pub use rule::{ExtensionRule, PathRule, SizeRange};
pub use schema::{CachePolicy, CompressionPolicy, RawConfig};
pub use store::{ConfigSnapshot, ConfigStore};
