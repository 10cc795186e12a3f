//! Exact inference for log-linear models.
//!
//! - [`table_factor`]: dense log-space tables and the sum/max combinators
//! - [`forest`]: clique forest discovery with running-intersection checks
//! - [`cache`]: factor and message caches reused across calls
//! - [`clique_tree`]: the two-pass message-passing engine
//! - [`result`]: marginal output bundle

pub mod cache;
pub mod clique_tree;
pub mod forest;
pub mod result;
pub mod table_factor;

pub use cache::CacheStats;
pub use clique_tree::CliqueTree;
pub use forest::{Forest, ForestTree};
pub use result::MarginalResult;
pub use table_factor::{MarginalizationMode, TableFactor};
