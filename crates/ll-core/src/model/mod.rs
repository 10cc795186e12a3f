//! Log-linear graphical models.
//!
//! A [`GraphicalModel`] is a list of factors, each an ordered tuple of
//! variable ids plus a dense table holding one feature vector per joint
//! assignment. Variables are plain integers whose domain sizes are inferred
//! from the factors touching them. The model, each variable, and each factor
//! carry a string→string metadata map; two reserved variable keys mark
//! observed (clamped) values and training labels.
//!
//! Factors are append-only and their feature tables are immutable once
//! added. Only metadata may change between inference calls, which is what
//! lets [`crate::inference::CliqueTree`] cache built tables by [`FactorId`].
//!
//! # Example
//!
//! ```rust
//! use ll_core::model::{DenseVector, FeatureVector, GraphicalModel};
//!
//! let mut model: GraphicalModel<FeatureVector> = GraphicalModel::new();
//! // Binary variables 0 and 1, agreement feature on weight index 0.
//! let factor = model
//!     .add_factor_with(vec![0, 1], vec![2, 2], |a| {
//!         if a[0] == a[1] {
//!             FeatureVector::indicator(0)
//!         } else {
//!             FeatureVector::Sparse(vec![])
//!         }
//!     })
//!     .unwrap();
//! model.observe(1, 0);
//!
//! assert_eq!(model.observed_value(1).unwrap(), Some(0));
//! assert_eq!(model.variable_sizes().unwrap(), vec![Some(2), Some(2)]);
//! assert_eq!(model.factor(factor).unwrap().neighbors(), &[0, 1]);
//! # let _ = DenseVector::new(vec![1.0]);
//! ```

pub mod weights;

pub use weights::{DenseVector, FeatureVector, StaticFeatures, WeightVector};

use std::collections::{BTreeMap, HashSet};

use ll_common::{Error, FactorId, ModelId, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::assignment::{flat_index, table_size, Assignments};

/// Variable metadata key holding the clamped state index, as a decimal string.
pub const VARIABLE_OBSERVED_VALUE: &str = "loglinear.inference.observed_value";

/// Variable metadata key holding the gold label used by learning code.
pub const VARIABLE_TRAINING_VALUE: &str = "loglinear.learning.training_value";

/// Largest variable id a factor may name. Per-variable state is stored
/// densely, so ids bound the memory every inference call allocates.
pub const MAX_VARIABLE_ID: usize = (1 << 24) - 1;

/// String→string metadata attached to models, variables, and factors.
pub type Metadata = BTreeMap<String, String>;

/// One factor of a model: neighbors, domain sizes, and a feature table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFactor<F> {
    neighbors: Vec<usize>,
    dims: Vec<usize>,
    features: Vec<F>,
    #[serde(default)]
    metadata: Metadata,
}

impl<F> ModelFactor<F> {
    fn new(neighbors: Vec<usize>, dims: Vec<usize>, features: Vec<F>) -> Result<Self> {
        let factor = Self {
            neighbors,
            dims,
            features,
            metadata: Metadata::new(),
        };
        factor.validate()?;
        Ok(factor)
    }

    /// Check arity, variable ids, table length, duplicate neighbors, and
    /// empty domains.
    pub fn validate(&self) -> Result<()> {
        if self.neighbors.len() != self.dims.len() {
            return Err(Error::ArityMismatch {
                neighbors: self.neighbors.len(),
                dims: self.dims.len(),
            });
        }
        let mut seen = HashSet::new();
        for (&variable, &dim) in self.neighbors.iter().zip(&self.dims) {
            if variable > MAX_VARIABLE_ID {
                return Err(Error::VariableIdTooLarge {
                    variable,
                    limit: MAX_VARIABLE_ID,
                });
            }
            if !seen.insert(variable) {
                return Err(Error::DuplicateNeighbor { variable });
            }
            if dim == 0 {
                return Err(Error::EmptyDomain { variable });
            }
        }
        let expected = table_size(&self.dims).ok_or_else(|| Error::TableTooLarge {
            dims: self.dims.clone(),
        })?;
        if self.features.len() != expected {
            return Err(Error::TableSizeMismatch {
                expected,
                found: self.features.len(),
            });
        }
        Ok(())
    }

    /// Variable ids, in table dimension order.
    pub fn neighbors(&self) -> &[usize] {
        &self.neighbors
    }

    /// Domain size of each neighbor.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Row-major feature table.
    pub fn features(&self) -> &[F] {
        &self.features
    }

    /// Row-major offset of a joint assignment over [`Self::neighbors`].
    pub fn assignment_index(&self, assignment: &[usize]) -> Option<usize> {
        flat_index(&self.dims, assignment)
    }

    /// Feature vector of one joint assignment over [`Self::neighbors`].
    pub fn features_at(&self, assignment: &[usize]) -> Option<&F> {
        self.assignment_index(assignment).map(|i| &self.features[i])
    }

    /// Every joint assignment in table order.
    pub fn assignments(&self) -> Assignments {
        Assignments::new(&self.dims)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Position of `variable` among the neighbors.
    pub fn position_of(&self, variable: usize) -> Option<usize> {
        self.neighbors.iter().position(|v| *v == variable)
    }
}

/// A log-linear graphical model.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))]
pub struct GraphicalModel<F> {
    #[serde(skip)]
    id: ModelId,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    variable_metadata: Vec<Metadata>,
    factors: Vec<ModelFactor<F>>,
}

impl<F> Default for GraphicalModel<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Clone> Clone for GraphicalModel<F> {
    fn clone(&self) -> Self {
        Self {
            id: ModelId::fresh(),
            metadata: self.metadata.clone(),
            variable_metadata: self.variable_metadata.clone(),
            factors: self.factors.clone(),
        }
    }
}

impl<F> GraphicalModel<F> {
    /// Create an empty model.
    pub fn new() -> Self {
        Self {
            id: ModelId::fresh(),
            metadata: Metadata::new(),
            variable_metadata: Vec::new(),
            factors: Vec::new(),
        }
    }

    /// Identity used to scope inference caches to this instance.
    pub fn id(&self) -> ModelId {
        self.id
    }

    /// Add a factor with an explicit row-major feature table.
    ///
    /// Rejects the factor if any neighbor's domain size disagrees with a
    /// factor already in the model.
    pub fn add_factor(
        &mut self,
        neighbors: Vec<usize>,
        dims: Vec<usize>,
        features: Vec<F>,
    ) -> Result<FactorId> {
        let factor = ModelFactor::new(neighbors, dims, features)?;
        let sizes = self.variable_sizes()?;
        for (&variable, &dim) in factor.neighbors.iter().zip(&factor.dims) {
            if let Some(Some(expected)) = sizes.get(variable) {
                if *expected != dim {
                    return Err(Error::InconsistentDomainSize {
                        variable,
                        expected: *expected,
                        found: dim,
                    });
                }
            }
        }
        let id = FactorId(self.factors.len());
        self.factors.push(factor);
        Ok(id)
    }

    /// Add a factor whose features are produced per joint assignment.
    pub fn add_factor_with(
        &mut self,
        neighbors: Vec<usize>,
        dims: Vec<usize>,
        mut features: impl FnMut(&[usize]) -> F,
    ) -> Result<FactorId> {
        if table_size(&dims).is_none() {
            return Err(Error::TableTooLarge { dims });
        }
        let table = Assignments::new(&dims).map(|a| features(&a)).collect();
        self.add_factor(neighbors, dims, table)
    }

    /// Add a factor with fixed log values that do not depend on the weights.
    pub fn add_static_factor(
        &mut self,
        neighbors: Vec<usize>,
        dims: Vec<usize>,
        mut log_value: impl FnMut(&[usize]) -> f64,
    ) -> Result<FactorId>
    where
        F: StaticFeatures,
    {
        self.add_factor_with(neighbors, dims, |a| F::constant(log_value(a)))
    }

    pub fn factor(&self, id: FactorId) -> Result<&ModelFactor<F>> {
        self.factors.get(id.index()).ok_or(Error::UnknownFactor(id))
    }

    /// All factors with their ids, in insertion order.
    pub fn factors(&self) -> impl Iterator<Item = (FactorId, &ModelFactor<F>)> {
        self.factors
            .iter()
            .enumerate()
            .map(|(i, f)| (FactorId(i), f))
    }

    pub fn factor_count(&self) -> usize {
        self.factors.len()
    }

    /// One past the largest variable id mentioned by a factor or metadata.
    pub fn variable_count(&self) -> usize {
        let from_factors = self
            .factors
            .iter()
            .flat_map(|f| f.neighbors.iter())
            .map(|v| v.saturating_add(1))
            .max()
            .unwrap_or(0);
        from_factors.max(self.variable_metadata.len())
    }

    /// Domain size of every variable, `None` for ids no factor touches.
    ///
    /// Also re-validates every factor, since deserialized models never went
    /// through [`Self::add_factor`].
    pub fn variable_sizes(&self) -> Result<Vec<Option<usize>>> {
        for factor in &self.factors {
            factor.validate()?;
        }
        let mut sizes = vec![None; self.variable_count()];
        for factor in &self.factors {
            for (&variable, &dim) in factor.neighbors.iter().zip(&factor.dims) {
                match sizes[variable] {
                    Some(expected) if expected != dim => {
                        return Err(Error::InconsistentDomainSize {
                            variable,
                            expected,
                            found: dim,
                        });
                    }
                    _ => sizes[variable] = Some(dim),
                }
            }
        }
        Ok(sizes)
    }

    pub fn model_metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn model_metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn factor_metadata(&self, id: FactorId) -> Result<&Metadata> {
        self.factor(id).map(|f| &f.metadata)
    }

    pub fn factor_metadata_mut(&mut self, id: FactorId) -> Result<&mut Metadata> {
        self.factors
            .get_mut(id.index())
            .map(|f| &mut f.metadata)
            .ok_or(Error::UnknownFactor(id))
    }

    /// Metadata of a variable, if any was ever written.
    pub fn variable_metadata(&self, variable: usize) -> Option<&Metadata> {
        self.variable_metadata.get(variable)
    }

    /// Metadata of a variable, created on first access.
    pub fn variable_metadata_mut(&mut self, variable: usize) -> &mut Metadata {
        if self.variable_metadata.len() <= variable {
            self.variable_metadata.resize_with(variable + 1, Metadata::new);
        }
        &mut self.variable_metadata[variable]
    }

    /// Clamp `variable` to state `value` for subsequent inference.
    pub fn observe(&mut self, variable: usize, value: usize) {
        self.variable_metadata_mut(variable)
            .insert(VARIABLE_OBSERVED_VALUE.to_string(), value.to_string());
    }

    /// Remove any clamp on `variable`.
    pub fn clear_observation(&mut self, variable: usize) {
        if let Some(metadata) = self.variable_metadata.get_mut(variable) {
            metadata.remove(VARIABLE_OBSERVED_VALUE);
        }
    }

    /// Clamped state of `variable`, if observed.
    pub fn observed_value(&self, variable: usize) -> Result<Option<usize>> {
        self.parse_state(variable, VARIABLE_OBSERVED_VALUE)
    }

    /// Clamped state per variable id, range-checked against `sizes`.
    pub fn observed_assignments(&self, sizes: &[Option<usize>]) -> Result<Vec<Option<usize>>> {
        let mut observed = vec![None; sizes.len().max(self.variable_count())];
        for (variable, slot) in observed.iter_mut().enumerate() {
            let Some(value) = self.observed_value(variable)? else {
                continue;
            };
            if let Some(Some(domain)) = sizes.get(variable) {
                if value >= *domain {
                    return Err(Error::ObservationOutOfRange {
                        variable,
                        value,
                        domain: *domain,
                    });
                }
            }
            *slot = Some(value);
        }
        Ok(observed)
    }

    pub fn set_training_value(&mut self, variable: usize, value: usize) {
        self.variable_metadata_mut(variable)
            .insert(VARIABLE_TRAINING_VALUE.to_string(), value.to_string());
    }

    /// Gold label of `variable`, if one was recorded.
    pub fn training_value(&self, variable: usize) -> Result<Option<usize>> {
        self.parse_state(variable, VARIABLE_TRAINING_VALUE)
    }

    fn parse_state(&self, variable: usize, key: &str) -> Result<Option<usize>> {
        let Some(raw) = self.variable_metadata(variable).and_then(|m| m.get(key)) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| Error::InvalidObservation {
                variable,
                value: raw.clone(),
            })
    }

    /// Structural equality, ignoring instance identity.
    pub fn value_equals(&self, other: &GraphicalModel<F>) -> bool
    where
        F: PartialEq,
    {
        self.metadata == other.metadata
            && trimmed(&self.variable_metadata) == trimmed(&other.variable_metadata)
            && self.factors == other.factors
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String>
    where
        F: Serialize,
    {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON, validating every factor and domain size.
    pub fn from_json(json: &str) -> Result<Self>
    where
        F: DeserializeOwned,
    {
        let model: GraphicalModel<F> = serde_json::from_str(json)?;
        model.variable_sizes()?;
        Ok(model)
    }
}

/// Variable metadata without trailing empty maps, which only reflect access
/// history.
fn trimmed(metadata: &[Metadata]) -> &[Metadata] {
    let len = metadata
        .iter()
        .rposition(|m| !m.is_empty())
        .map_or(0, |i| i + 1);
    &metadata[..len]
}
