//! Factor and model identity types.
//!
//! Inference caches are keyed by these integers instead of by object
//! address. A factor is uniquely identified by (model, insertion index).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Index of a factor within its model.
///
/// Factors are append-only, so an id stays valid for the model's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactorId(pub usize);

impl FactorId {
    /// Position of the factor in its model's factor list.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for FactorId {
    fn from(index: usize) -> Self {
        FactorId(index)
    }
}

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one model instance.
///
/// Clones and deserialized copies get a fresh id: two models may share
/// factor indices while holding different feature tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(u64);

impl ModelId {
    /// Allocate a new, never-before-seen model id.
    pub fn fresh() -> Self {
        ModelId(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logging.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for ModelId {
    fn default() -> Self {
        ModelId::fresh()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_model_ids_are_distinct() {
        let a = ModelId::fresh();
        let b = ModelId::fresh();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn factor_id_serializes_transparently() {
        let json = serde_json::to_string(&FactorId(7)).unwrap();
        assert_eq!(json, "7");
        let back: FactorId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.index(), 7);
    }

    #[test]
    fn display_formats() {
        assert_eq!(FactorId(3).to_string(), "3");
        assert!(ModelId::fresh().to_string().starts_with("model-"));
    }
}
