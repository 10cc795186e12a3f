//! Log-linear inference common types, IDs, and errors.
//!
//! This crate provides foundational types shared across ll-core modules:
//! - Stable factor and model identifiers used as cache keys
//! - The unified error type with stable codes
//! - Inference configuration loading and validation

pub mod config;
pub mod error;
pub mod id;

pub use config::{ConfigResolution, ConfigResolver, ConfigSource, InferenceConfig};
pub use error::{Error, ErrorCategory, Result};
pub use id::{FactorId, ModelId};
