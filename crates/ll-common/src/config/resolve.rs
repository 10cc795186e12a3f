//! Configuration resolution for inference.
//!
//! Implements deterministic config resolution order:
//! 1. Explicit path supplied by the caller
//! 2. Environment variable (LOGLINEAR_CONFIG)
//! 3. Built-in defaults

use std::env;
use std::fs;
use std::path::PathBuf;

use super::{ConfigResolution, ConfigSource, InferenceConfig};
use crate::error::{Error, Result};

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV_VAR: &str = "LOGLINEAR_CONFIG";

/// Configuration resolver with deterministic resolution order.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Path from the caller, highest priority
    explicit_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Create a resolver that prefers the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ConfigResolver {
            explicit_path: Some(path.into()),
        }
    }

    /// Create a resolver with no explicit override.
    pub fn with_defaults() -> Self {
        ConfigResolver::default()
    }

    /// Resolve the config file path.
    pub fn resolve_path(&self) -> (Option<PathBuf>, ConfigResolution) {
        // 1. Explicit path
        if let Some(ref path) = self.explicit_path {
            return (Some(path.clone()), ConfigResolution::Explicit);
        }

        // 2. LOGLINEAR_CONFIG env var
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return (Some(PathBuf::from(path)), ConfigResolution::EnvVar);
            }
        }

        // 3. Default
        (None, ConfigResolution::Default)
    }

    /// Load the inference config from the resolved path or defaults.
    pub fn load(&self) -> Result<(InferenceConfig, ConfigSource)> {
        let (path, resolution) = self.resolve_path();

        match path {
            Some(p) => {
                let content = fs::read_to_string(&p).map_err(|e| {
                    Error::Config(format!("failed to read config from {}: {}", p.display(), e))
                })?;

                let config = InferenceConfig::from_json(&content).map_err(|e| match e {
                    Error::Json(err) => {
                        Error::Config(format!("failed to parse {}: {}", p.display(), err))
                    }
                    other => other,
                })?;

                Ok((
                    config,
                    ConfigSource {
                        path: Some(p.to_string_lossy().to_string()),
                        resolution,
                    },
                ))
            }
            None => Ok((
                InferenceConfig::default(),
                ConfigSource {
                    path: None,
                    resolution: ConfigResolution::Default,
                },
            )),
        }
    }
}
