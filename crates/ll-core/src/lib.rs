//! Log-linear inference core library
//!
//! This library provides exact inference for log-linear (CRF-style)
//! graphical models:
//! - The graphical model data model and weight-vector abstraction
//! - Dense log-space factor tables
//! - Clique-tree message passing for marginals, partition function, and MAP
//! - Structured logging setup

pub mod assignment;
pub mod inference;
pub mod logging;
pub mod model;

pub use inference::{CliqueTree, MarginalResult, MarginalizationMode, TableFactor};
pub use ll_common::{Error, FactorId, InferenceConfig, ModelId, Result};
pub use model::{GraphicalModel, ModelFactor, WeightVector};

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
