//! Error types for log-linear inference.
//!
//! Errors carry:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for callers that retry with different input
//!
//! Impossible (zero-probability) observations are deliberately absent from
//! this taxonomy: inference absorbs them and returns a uniform result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::FactorId;

/// Result type alias for log-linear inference operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed model: shapes, arities, domain sizes.
    Model,
    /// Observation metadata that cannot be applied.
    Observation,
    /// Inference-time structural and numerical failures.
    Inference,
    /// Configuration file errors.
    Config,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Model => write!(f, "model"),
            ErrorCategory::Observation => write!(f, "observation"),
            ErrorCategory::Inference => write!(f, "inference"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for log-linear inference.
#[derive(Error, Debug)]
pub enum Error {
    // Model errors (10-19)
    #[error("variable {variable} has domain size {found}, but another factor declares {expected}")]
    InconsistentDomainSize {
        variable: usize,
        expected: usize,
        found: usize,
    },

    #[error("feature table holds {found} entries, expected {expected}")]
    TableSizeMismatch { expected: usize, found: usize },

    #[error("factor lists {neighbors} neighbors but {dims} dimensions")]
    ArityMismatch { neighbors: usize, dims: usize },

    #[error("variable {variable} appears more than once in a factor")]
    DuplicateNeighbor { variable: usize },

    #[error("variable {variable} has an empty domain")]
    EmptyDomain { variable: usize },

    #[error("no factor with id {0}")]
    UnknownFactor(FactorId),

    #[error("assignment {assignment:?} does not index a table with dimensions {dims:?}")]
    InvalidAssignment {
        assignment: Vec<usize>,
        dims: Vec<usize>,
    },

    #[error("a table with dimensions {dims:?} has more entries than fit in memory")]
    TableTooLarge { dims: Vec<usize> },

    #[error("variable id {variable} exceeds the largest supported id {limit}")]
    VariableIdTooLarge { variable: usize, limit: usize },

    // Observation errors (20-29)
    #[error("observed value {value:?} for variable {variable} is not a state index")]
    InvalidObservation { variable: usize, value: String },

    #[error("observed value {value} for variable {variable} is outside its domain of size {domain}")]
    ObservationOutOfRange {
        variable: usize,
        value: usize,
        domain: usize,
    },

    // Inference errors (30-39)
    #[error("factor {factor} breaks the forest structure: {message}")]
    StructuralViolation { factor: FactorId, message: String },

    #[error("variable {variable} is not a neighbor of this table")]
    UnknownVariable { variable: usize },

    #[error("numerical instability detected: {0}")]
    NumericalInstability(String),

    // Configuration errors (40-49)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid value for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Model errors
    /// - 20-29: Observation errors
    /// - 30-39: Inference errors
    /// - 40-49: Configuration errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::InconsistentDomainSize { .. } => 10,
            Error::TableSizeMismatch { .. } => 11,
            Error::ArityMismatch { .. } => 12,
            Error::DuplicateNeighbor { .. } => 13,
            Error::EmptyDomain { .. } => 14,
            Error::UnknownFactor(_) => 15,
            Error::InvalidAssignment { .. } => 16,
            Error::TableTooLarge { .. } => 17,
            Error::VariableIdTooLarge { .. } => 18,
            Error::InvalidObservation { .. } => 20,
            Error::ObservationOutOfRange { .. } => 21,
            Error::StructuralViolation { .. } => 30,
            Error::UnknownVariable { .. } => 31,
            Error::NumericalInstability(_) => 32,
            Error::Config(_) => 40,
            Error::InvalidConfig { .. } => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InconsistentDomainSize { .. }
            | Error::TableSizeMismatch { .. }
            | Error::ArityMismatch { .. }
            | Error::DuplicateNeighbor { .. }
            | Error::EmptyDomain { .. }
            | Error::UnknownFactor(_)
            | Error::InvalidAssignment { .. }
            | Error::TableTooLarge { .. }
            | Error::VariableIdTooLarge { .. } => ErrorCategory::Model,

            Error::InvalidObservation { .. } | Error::ObservationOutOfRange { .. } => {
                ErrorCategory::Observation
            }

            Error::StructuralViolation { .. }
            | Error::UnknownVariable { .. }
            | Error::NumericalInstability(_) => ErrorCategory::Inference,

            Error::Config(_) | Error::InvalidConfig { .. } => ErrorCategory::Config,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether retrying with corrected input can succeed.
    ///
    /// Model and structural errors describe the model itself and will recur
    /// on every call until the model is rebuilt.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::InconsistentDomainSize { .. }
            | Error::TableSizeMismatch { .. }
            | Error::ArityMismatch { .. }
            | Error::DuplicateNeighbor { .. }
            | Error::EmptyDomain { .. }
            | Error::TableTooLarge { .. }
            | Error::VariableIdTooLarge { .. }
            | Error::StructuralViolation { .. } => false,

            // Fixable by passing a different id or variable.
            Error::UnknownFactor(_)
            | Error::UnknownVariable { .. }
            | Error::InvalidAssignment { .. } => true,

            // Fixable by rewriting the observation metadata.
            Error::InvalidObservation { .. } | Error::ObservationOutOfRange { .. } => true,

            Error::NumericalInstability(_) => false,

            Error::Config(_) | Error::InvalidConfig { .. } => true,

            Error::Io(_) | Error::Json(_) => true,
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::InconsistentDomainSize { .. } => "Inconsistent Domain Size",
            Error::TableSizeMismatch { .. } => "Feature Table Size Mismatch",
            Error::ArityMismatch { .. } => "Factor Arity Mismatch",
            Error::DuplicateNeighbor { .. } => "Duplicate Factor Neighbor",
            Error::EmptyDomain { .. } => "Empty Variable Domain",
            Error::UnknownFactor(_) => "Unknown Factor",
            Error::InvalidAssignment { .. } => "Invalid Assignment",
            Error::TableTooLarge { .. } => "Table Too Large",
            Error::VariableIdTooLarge { .. } => "Variable Id Too Large",
            Error::InvalidObservation { .. } => "Invalid Observation",
            Error::ObservationOutOfRange { .. } => "Observation Out Of Range",
            Error::StructuralViolation { .. } => "Model Is Not A Forest",
            Error::UnknownVariable { .. } => "Unknown Variable",
            Error::NumericalInstability(_) => "Numerical Instability",
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig { .. } => "Invalid Configuration Value",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_grouped_by_category() {
        let cases: Vec<(Error, ErrorCategory)> = vec![
            (
                Error::InconsistentDomainSize {
                    variable: 0,
                    expected: 2,
                    found: 3,
                },
                ErrorCategory::Model,
            ),
            (
                Error::InvalidObservation {
                    variable: 1,
                    value: "x".to_string(),
                },
                ErrorCategory::Observation,
            ),
            (
                Error::StructuralViolation {
                    factor: FactorId(4),
                    message: "cycle".to_string(),
                },
                ErrorCategory::Inference,
            ),
            (Error::Config("bad".to_string()), ErrorCategory::Config),
        ];

        for (err, category) in cases {
            assert_eq!(err.category(), category);
            let decade = match category {
                ErrorCategory::Model => 10,
                ErrorCategory::Observation => 20,
                ErrorCategory::Inference => 30,
                ErrorCategory::Config => 40,
                ErrorCategory::Io => 60,
            };
            assert!(err.code() >= decade && err.code() < decade + 10);
        }
    }

    #[test]
    fn structural_errors_are_fatal() {
        let err = Error::StructuralViolation {
            factor: FactorId(2),
            message: "shares variable 3 with another tree".to_string(),
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.headline(), "Model Is Not A Forest");
        assert!(err.to_string().contains("factor 2"));
    }

    #[test]
    fn size_limits_are_model_errors() {
        let err = Error::VariableIdTooLarge {
            variable: usize::MAX,
            limit: 7,
        };
        assert_eq!(err.code(), 18);
        assert_eq!(err.category(), ErrorCategory::Model);
        assert!(!err.is_recoverable());

        let err = Error::TableTooLarge {
            dims: vec![usize::MAX, 2],
        };
        assert_eq!(err.code(), 17);
        assert_eq!(err.headline(), "Table Too Large");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert_eq!(err.code(), 60);
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn category_display() {
        assert_eq!(ErrorCategory::Observation.to_string(), "observation");
        assert_eq!(ErrorCategory::Inference.to_string(), "inference");
    }
}
