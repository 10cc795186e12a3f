//! Configuration loading and validation for inference.
//!
//! This module provides:
//! - The typed `InferenceConfig` structure (JSON on disk)
//! - Deterministic config resolution (explicit path > env > defaults)
//! - Semantic validation

pub mod resolve;

pub use resolve::ConfigResolver;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tunables for clique-tree inference.
///
/// Both caches are pure performance layers: disabling them must not change
/// any computed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    /// Reuse a factor's table while its observation pattern is unchanged.
    pub cache_factors: bool,
    /// Reuse messages from the previous call when at most one clique changed.
    pub cache_messages: bool,
    /// Relative tolerance for the per-tree partition function agreement check.
    pub partition_tolerance: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            cache_factors: true,
            cache_messages: true,
            partition_tolerance: 1e-6,
        }
    }
}

impl InferenceConfig {
    /// Configuration with every cache disabled (full recomputation).
    pub fn uncached() -> Self {
        Self {
            cache_factors: false,
            cache_messages: false,
            ..Default::default()
        }
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: InferenceConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration semantically.
    pub fn validate(&self) -> Result<()> {
        if !self.partition_tolerance.is_finite() || self.partition_tolerance < 0.0 {
            return Err(Error::InvalidConfig {
                field: "partition_tolerance".to_string(),
                message: format!(
                    "must be a finite, non-negative number, got {}",
                    self.partition_tolerance
                ),
            });
        }
        Ok(())
    }
}

/// Configuration source for a loaded config.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file, or None if using defaults
    pub path: Option<String>,
    /// How this source was resolved
    pub resolution: ConfigResolution,
}

/// How a config file was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigResolution {
    /// From an explicit path given by the caller
    Explicit,
    /// From environment variable
    EnvVar,
    /// Using built-in defaults
    Default,
}

impl std::fmt::Display for ConfigResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigResolution::Explicit => write!(f, "explicit"),
            ConfigResolution::EnvVar => write!(f, "env"),
            ConfigResolution::Default => write!(f, "default"),
        }
    }
}
