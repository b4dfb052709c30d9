//! Rule Resolver (spec.md §4.1).

pub mod head_prober;
pub mod probe;
pub mod resolve;
pub mod types;

pub use head_prober::HeadProber;
pub use probe::{ProbeCache, SizeProber};
pub use resolve::resolve;
pub use types::{Mode, NotRouted, ResolveRequest, ResolvedTarget};
