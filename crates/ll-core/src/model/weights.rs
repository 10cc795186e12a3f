//! Weight vectors and the feature vectors they score.
//!
//! The inference engine only ever asks a weight vector for its dot product
//! with a feature vector and clones it once per clique tree. Everything else
//! about the feature representation is up to the implementor.

use serde::{Deserialize, Serialize};

/// A weight vector that scores feature vectors by dot product.
pub trait WeightVector: Clone {
    /// The feature vector type stored in model factor tables.
    type Features;

    /// Log-space score of one joint assignment's features.
    fn dot(&self, features: &Self::Features) -> f64;
}

/// Feature types able to encode a weight-independent log value.
pub trait StaticFeatures {
    /// Features whose dot product with any weight vector is `log_value`.
    fn constant(log_value: f64) -> Self;
}

/// Feature vector scored by [`DenseVector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureVector {
    /// One component per weight index.
    Dense(Vec<f64>),
    /// `(weight index, value)` pairs; unlisted indices are zero.
    Sparse(Vec<(usize, f64)>),
    /// A fixed log value that ignores the weights.
    Constant(f64),
}

impl FeatureVector {
    /// Feature vector with a single active indicator.
    pub fn indicator(index: usize) -> Self {
        FeatureVector::Sparse(vec![(index, 1.0)])
    }
}

impl StaticFeatures for FeatureVector {
    fn constant(log_value: f64) -> Self {
        FeatureVector::Constant(log_value)
    }
}

/// Dense weight vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DenseVector(pub Vec<f64>);

impl DenseVector {
    /// Wrap raw weights.
    pub fn new(weights: Vec<f64>) -> Self {
        DenseVector(weights)
    }

    /// Weight at `index`; indices past the end read as zero.
    pub fn get(&self, index: usize) -> f64 {
        self.0.get(index).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Mutable access, e.g. for an optimizer stepping the weights.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.0
    }
}

impl From<Vec<f64>> for DenseVector {
    fn from(weights: Vec<f64>) -> Self {
        DenseVector(weights)
    }
}

impl WeightVector for DenseVector {
    type Features = FeatureVector;

    fn dot(&self, features: &FeatureVector) -> f64 {
        match features {
            FeatureVector::Dense(values) => values
                .iter()
                .zip(self.0.iter())
                .map(|(f, w)| f * w)
                .sum(),
            FeatureVector::Sparse(entries) => entries
                .iter()
                .map(|(index, value)| self.get(*index) * value)
                .sum(),
            FeatureVector::Constant(log_value) => *log_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_dot_ignores_missing_components() {
        let weights = DenseVector::new(vec![1.0, 2.0]);
        let features = FeatureVector::Dense(vec![3.0, 4.0, 100.0]);
        assert_eq!(weights.dot(&features), 11.0);
    }

    #[test]
    fn sparse_dot() {
        let weights = DenseVector::new(vec![0.5, -1.0, 2.0]);
        let features = FeatureVector::Sparse(vec![(0, 2.0), (2, 1.5), (9, 7.0)]);
        assert_eq!(weights.dot(&features), 4.0);
    }

    #[test]
    fn indicator_selects_one_weight() {
        let weights = DenseVector::new(vec![0.25, 0.75]);
        assert_eq!(weights.dot(&FeatureVector::indicator(1)), 0.75);
    }

    #[test]
    fn constant_ignores_weights() {
        let weights = DenseVector::new(vec![10.0]);
        assert_eq!(weights.dot(&FeatureVector::constant(-2.5)), -2.5);
        assert_eq!(
            weights.dot(&FeatureVector::constant(f64::NEG_INFINITY)),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn clone_is_deep() {
        let mut original = DenseVector::new(vec![1.0, 2.0]);
        let copy = original.clone();
        original.as_mut_slice()[0] = 42.0;
        assert_eq!(copy.get(0), 1.0);
    }
}
