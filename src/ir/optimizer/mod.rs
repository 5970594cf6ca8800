pub mod combined;
pub mod identities;
pub mod phase;

pub use combined::{CombinedConfig, CombinedOptimizer, CombinedStats};
pub use identities::LocalSimplify;
pub use phase::{Phase, run_pipeline};
