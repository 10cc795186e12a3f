//! Dense log-space factor tables.
//!
//! A [`TableFactor`] holds one natural-log value per joint assignment of an
//! ordered tuple of variables, laid out row-major (last neighbor fastest).
//! All combinators work in log space: multiplication adds, summation folds
//! with a max-subtracted log-sum-exp. `-inf` encodes probability zero.
//!
//! The linear-space accessors ([`TableFactor::assignment_value`],
//! [`TableFactor::set_assignment_value`], [`TableFactor::value_sum`] and the
//! marginal readers) convert only at the boundary.

use std::collections::HashSet;

use ll_common::{Error, Result};
use ll_math::{exp_normalize, log_max, log_sum_exp, uniform};
use serde::{Deserialize, Serialize};

use crate::assignment::{flat_index, strides, table_size, Assignments};
use crate::model::{ModelFactor, WeightVector};

/// How a variable is folded out of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginalizationMode {
    /// Sum-product: log-sum-exp over the folded states.
    Sum,
    /// Max-product: maximum over the folded states.
    Max,
}

impl MarginalizationMode {
    /// Fold a run of log values into one.
    pub fn fold(self, log_values: &[f64]) -> f64 {
        match self {
            MarginalizationMode::Sum => log_sum_exp(log_values),
            MarginalizationMode::Max => log_max(log_values),
        }
    }

    fn fold_pair(self, a: f64, b: f64) -> f64 {
        match self {
            MarginalizationMode::Sum => ll_math::log_add_exp(a, b),
            MarginalizationMode::Max => a.max(b),
        }
    }
}

impl std::fmt::Display for MarginalizationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarginalizationMode::Sum => write!(f, "sum"),
            MarginalizationMode::Max => write!(f, "max"),
        }
    }
}

/// Dense log-space table over an ordered tuple of variables.
#[derive(Debug, Clone, PartialEq)]
pub struct TableFactor {
    neighbors: Vec<usize>,
    dims: Vec<usize>,
    log_values: Vec<f64>,
}

impl TableFactor {
    /// Table with every entry at log 0 (linear 1).
    pub fn new(neighbors: Vec<usize>, dims: Vec<usize>) -> Result<Self> {
        Self::filled(neighbors, dims, 0.0)
    }

    /// Table with every entry at log `-inf` (linear 0).
    pub fn zeros(neighbors: Vec<usize>, dims: Vec<usize>) -> Result<Self> {
        Self::filled(neighbors, dims, f64::NEG_INFINITY)
    }

    /// Table from explicit row-major log values.
    pub fn from_log_values(
        neighbors: Vec<usize>,
        dims: Vec<usize>,
        log_values: Vec<f64>,
    ) -> Result<Self> {
        let expected = check_shape(&neighbors, &dims)?;
        if log_values.len() != expected {
            return Err(Error::TableSizeMismatch {
                expected,
                found: log_values.len(),
            });
        }
        Ok(Self {
            neighbors,
            dims,
            log_values,
        })
    }

    fn filled(neighbors: Vec<usize>, dims: Vec<usize>, log_value: f64) -> Result<Self> {
        let size = check_shape(&neighbors, &dims)?;
        Ok(Self {
            neighbors,
            dims,
            log_values: vec![log_value; size],
        })
    }

    /// Score every joint assignment of a model factor against `weights`.
    pub fn from_weights<W: WeightVector>(weights: &W, factor: &ModelFactor<W::Features>) -> Self {
        Self {
            neighbors: factor.neighbors().to_vec(),
            dims: factor.dims().to_vec(),
            log_values: factor.features().iter().map(|f| weights.dot(f)).collect(),
        }
    }

    /// Score a model factor with some neighbors clamped.
    ///
    /// `observations` is indexed by neighbor position. The result spans only
    /// the unobserved neighbors; a fully observed factor yields a scalar
    /// table holding the log value of its observed assignment.
    pub fn from_weights_observed<W: WeightVector>(
        weights: &W,
        factor: &ModelFactor<W::Features>,
        observations: &[Option<usize>],
    ) -> Result<Self> {
        if observations.len() != factor.neighbors().len() {
            return Err(Error::ArityMismatch {
                neighbors: factor.neighbors().len(),
                dims: observations.len(),
            });
        }
        if observations.iter().all(Option::is_none) {
            return Ok(Self::from_weights(weights, factor));
        }

        let mut neighbors = Vec::new();
        let mut dims = Vec::new();
        let mut free = Vec::new();
        for (pos, observed) in observations.iter().enumerate() {
            let variable = factor.neighbors()[pos];
            let domain = factor.dims()[pos];
            match observed {
                Some(value) if *value >= domain => {
                    return Err(Error::ObservationOutOfRange {
                        variable,
                        value: *value,
                        domain,
                    });
                }
                Some(_) => {}
                None => {
                    neighbors.push(variable);
                    dims.push(domain);
                    free.push(pos);
                }
            }
        }

        let mut full: Vec<usize> = observations.iter().map(|o| o.unwrap_or(0)).collect();
        let mut log_values = Vec::with_capacity(checked_size(&dims)?);
        for assignment in Assignments::new(&dims) {
            for (value, pos) in assignment.iter().zip(&free) {
                full[*pos] = *value;
            }
            let log_value = factor
                .features_at(&full)
                .map_or(f64::NEG_INFINITY, |f| weights.dot(f));
            log_values.push(log_value);
        }

        Ok(Self {
            neighbors,
            dims,
            log_values,
        })
    }

    pub fn neighbors(&self) -> &[usize] {
        &self.neighbors
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Row-major log values.
    pub fn log_values(&self) -> &[f64] {
        &self.log_values
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.log_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_values.is_empty()
    }

    /// Position of `variable` among the neighbors.
    pub fn position_of(&self, variable: usize) -> Option<usize> {
        self.neighbors.iter().position(|v| *v == variable)
    }

    pub fn contains(&self, variable: usize) -> bool {
        self.position_of(variable).is_some()
    }

    /// Domain size of `variable`, if it is a neighbor.
    pub fn domain_size(&self, variable: usize) -> Option<usize> {
        self.position_of(variable).map(|pos| self.dims[pos])
    }

    /// Every joint assignment in table order.
    pub fn assignments(&self) -> Assignments {
        Assignments::new(&self.dims)
    }

    fn index_of(&self, assignment: &[usize]) -> Result<usize> {
        flat_index(&self.dims, assignment).ok_or_else(|| Error::InvalidAssignment {
            assignment: assignment.to_vec(),
            dims: self.dims.clone(),
        })
    }

    pub fn assignment_log_value(&self, assignment: &[usize]) -> Result<f64> {
        Ok(self.log_values[self.index_of(assignment)?])
    }

    pub fn set_assignment_log_value(&mut self, assignment: &[usize], log_value: f64) -> Result<()> {
        let index = self.index_of(assignment)?;
        self.log_values[index] = log_value;
        Ok(())
    }

    /// Linear-space value of one assignment.
    pub fn assignment_value(&self, assignment: &[usize]) -> Result<f64> {
        self.assignment_log_value(assignment).map(f64::exp)
    }

    /// Set one assignment from a linear-space value (0 maps to `-inf`).
    pub fn set_assignment_value(&mut self, assignment: &[usize], value: f64) -> Result<()> {
        self.set_assignment_log_value(assignment, value.ln())
    }

    /// True when every entry has probability zero.
    pub fn is_impossible(&self) -> bool {
        self.log_values.iter().all(|v| *v == f64::NEG_INFINITY)
    }

    /// Outer join over the union of both neighbor sets.
    ///
    /// The result lists this table's neighbors first, then the other
    /// table's new ones in their order.
    pub fn multiply(&self, other: &TableFactor) -> Result<TableFactor> {
        let mut neighbors = self.neighbors.clone();
        let mut dims = self.dims.clone();
        for (&variable, &dim) in other.neighbors.iter().zip(&other.dims) {
            match self.domain_size(variable) {
                Some(expected) if expected != dim => {
                    return Err(Error::InconsistentDomainSize {
                        variable,
                        expected,
                        found: dim,
                    });
                }
                Some(_) => {}
                None => {
                    neighbors.push(variable);
                    dims.push(dim);
                }
            }
        }

        let left = self.projected_strides(&neighbors);
        let right = other.projected_strides(&neighbors);
        let size = checked_size(&dims)?;
        let mut log_values = Vec::with_capacity(size);
        let mut counter = vec![0usize; dims.len()];
        let (mut li, mut ri) = (0usize, 0usize);
        for _ in 0..size {
            log_values.push(self.log_values[li] + other.log_values[ri]);
            for d in (0..dims.len()).rev() {
                counter[d] += 1;
                li += left[d];
                ri += right[d];
                if counter[d] < dims[d] {
                    break;
                }
                li -= left[d] * dims[d];
                ri -= right[d] * dims[d];
                counter[d] = 0;
            }
        }

        Ok(TableFactor {
            neighbors,
            dims,
            log_values,
        })
    }

    /// This table's stride along each of `variables`, 0 where absent.
    fn projected_strides(&self, variables: &[usize]) -> Vec<usize> {
        let own = strides(&self.dims);
        variables
            .iter()
            .map(|v| self.position_of(*v).map_or(0, |pos| own[pos]))
            .collect()
    }

    /// Remove `variable` by log-sum-exp over its states.
    pub fn sum_out(&self, variable: usize) -> Result<TableFactor> {
        self.marginalize(variable, MarginalizationMode::Sum)
    }

    /// Remove `variable` by taking the maximum over its states.
    pub fn max_out(&self, variable: usize) -> Result<TableFactor> {
        self.marginalize(variable, MarginalizationMode::Max)
    }

    /// Remove one variable, folding its states with `mode`.
    pub fn marginalize(&self, variable: usize, mode: MarginalizationMode) -> Result<TableFactor> {
        let pos = self
            .position_of(variable)
            .ok_or(Error::UnknownVariable { variable })?;

        let log_values = if self.dims.len() == 2 {
            self.fold_binary(pos, mode)
        } else {
            self.fold_general(pos, |run| mode.fold(run))
        };

        let (neighbors, dims) = self.without(pos);
        Ok(TableFactor {
            neighbors,
            dims,
            log_values,
        })
    }

    /// Two-neighbor fold without the scratch buffer.
    fn fold_binary(&self, pos: usize, mode: MarginalizationMode) -> Vec<f64> {
        let (rows, cols) = (self.dims[0], self.dims[1]);
        if pos == 1 {
            (0..rows)
                .map(|r| mode.fold(&self.log_values[r * cols..(r + 1) * cols]))
                .collect()
        } else {
            (0..cols)
                .map(|c| {
                    let column = (0..rows).map(|r| self.log_values[r * cols + c]);
                    match mode {
                        MarginalizationMode::Max => column.fold(f64::NEG_INFINITY, f64::max),
                        MarginalizationMode::Sum => {
                            let max = column.clone().fold(f64::NEG_INFINITY, f64::max);
                            if !max.is_finite() {
                                max
                            } else {
                                max + column.map(|v| (v - max).exp()).sum::<f64>().ln()
                            }
                        }
                    }
                })
                .collect()
        }
    }

    /// Fold dimension `pos` of a table of any arity.
    ///
    /// Entries sharing every other coordinate form a run of `dims[pos]`
    /// values spaced `inner` apart; each run collapses to one output cell.
    fn fold_general(&self, pos: usize, fold: impl Fn(&[f64]) -> f64) -> Vec<f64> {
        let span = self.dims[pos];
        let inner: usize = self.dims[pos + 1..].iter().product();
        let outer: usize = self.dims[..pos].iter().product();
        let mut out = Vec::with_capacity(outer * inner);
        let mut run = vec![0.0; span];
        for o in 0..outer {
            let base = o * span * inner;
            for i in 0..inner {
                for (k, slot) in run.iter_mut().enumerate() {
                    *slot = self.log_values[base + k * inner + i];
                }
                out.push(fold(&run));
            }
        }
        out
    }

    fn without(&self, pos: usize) -> (Vec<usize>, Vec<usize>) {
        let mut neighbors = self.neighbors.clone();
        let mut dims = self.dims.clone();
        neighbors.remove(pos);
        dims.remove(pos);
        (neighbors, dims)
    }

    /// Marginalize out every neighbor not listed in `keep`.
    ///
    /// Entries of `keep` that are not neighbors are ignored, so a message can
    /// be projected onto the full variable set of the receiving clique.
    pub fn marginalize_onto(&self, keep: &[usize], mode: MarginalizationMode) -> Result<TableFactor> {
        let mut table = self.clone();
        for &variable in &self.neighbors {
            if !keep.contains(&variable) {
                table = table.marginalize(variable, mode)?;
            }
        }
        Ok(table)
    }

    /// Slice at `variable = value` and drop that dimension.
    pub fn observe(&self, variable: usize, value: usize) -> Result<TableFactor> {
        let pos = self
            .position_of(variable)
            .ok_or(Error::UnknownVariable { variable })?;
        if value >= self.dims[pos] {
            return Err(Error::ObservationOutOfRange {
                variable,
                value,
                domain: self.dims[pos],
            });
        }
        let log_values = self.fold_general(pos, |run| run[value]);
        let (neighbors, dims) = self.without(pos);
        Ok(TableFactor {
            neighbors,
            dims,
            log_values,
        })
    }

    /// Log of the total linear mass.
    pub fn log_value_sum(&self) -> f64 {
        log_sum_exp(&self.log_values)
    }

    /// Total linear mass.
    pub fn value_sum(&self) -> f64 {
        self.log_value_sum().exp()
    }

    /// Largest log value in the table.
    pub fn max_log_value(&self) -> f64 {
        log_max(&self.log_values)
    }

    /// Table divided by its total mass. A table with no mass stays all `-inf`.
    pub fn normalized(&self) -> TableFactor {
        let log_z = self.log_value_sum();
        let log_values = if log_z.is_finite() {
            self.log_values.iter().map(|v| v - log_z).collect()
        } else {
            vec![f64::NEG_INFINITY; self.log_values.len()]
        };
        TableFactor {
            neighbors: self.neighbors.clone(),
            dims: self.dims.clone(),
            log_values,
        }
    }

    /// Normalized distribution of every neighbor, summing out the rest.
    pub fn summed_marginals(&self) -> Vec<Vec<f64>> {
        self.marginals(MarginalizationMode::Sum)
    }

    /// Normalized max-marginal of every neighbor.
    pub fn maxed_marginals(&self) -> Vec<Vec<f64>> {
        self.marginals(MarginalizationMode::Max)
    }

    pub fn summed_marginal(&self, variable: usize) -> Result<Vec<f64>> {
        self.marginal(variable, MarginalizationMode::Sum)
    }

    pub fn maxed_marginal(&self, variable: usize) -> Result<Vec<f64>> {
        self.marginal(variable, MarginalizationMode::Max)
    }

    fn marginals(&self, mode: MarginalizationMode) -> Vec<Vec<f64>> {
        (0..self.neighbors.len())
            .map(|pos| self.dimension_marginal(pos, mode))
            .collect()
    }

    fn marginal(&self, variable: usize, mode: MarginalizationMode) -> Result<Vec<f64>> {
        let pos = self
            .position_of(variable)
            .ok_or(Error::UnknownVariable { variable })?;
        Ok(self.dimension_marginal(pos, mode))
    }

    /// Distribution over one dimension; uniform when the table has no mass.
    fn dimension_marginal(&self, pos: usize, mode: MarginalizationMode) -> Vec<f64> {
        let span = self.dims[pos];
        let inner: usize = self.dims[pos + 1..].iter().product();
        let mut per_state = vec![f64::NEG_INFINITY; span];
        for (index, &log_value) in self.log_values.iter().enumerate() {
            let state = (index / inner) % span;
            per_state[state] = mode.fold_pair(per_state[state], log_value);
        }
        exp_normalize(&per_state).unwrap_or_else(|| uniform(span))
    }

    /// Highest-valued joint assignment; ties go to the first in table order.
    pub fn argmax_assignment(&self) -> Vec<usize> {
        let none = vec![None; self.neighbors.len()];
        self.argmax_assignment_consistent(&none)
            .unwrap_or_else(|| vec![0; self.neighbors.len()])
    }

    /// Highest-valued joint assignment agreeing with `fixed`.
    ///
    /// `fixed` is indexed by neighbor position. Returns `None` when its
    /// length is wrong or no assignment agrees with it.
    pub fn argmax_assignment_consistent(&self, fixed: &[Option<usize>]) -> Option<Vec<usize>> {
        if fixed.len() != self.neighbors.len() {
            return None;
        }
        let mut best: Option<(f64, Vec<usize>)> = None;
        for (assignment, &log_value) in self.assignments().zip(&self.log_values) {
            let agrees = fixed
                .iter()
                .zip(&assignment)
                .all(|(f, a)| f.map_or(true, |v| v == *a));
            if !agrees {
                continue;
            }
            match &best {
                Some((score, _)) if log_value <= *score => {}
                _ => best = Some((log_value, assignment)),
            }
        }
        best.map(|(_, assignment)| assignment)
    }
}

/// Validate a table shape and return its entry count.
fn check_shape(neighbors: &[usize], dims: &[usize]) -> Result<usize> {
    if neighbors.len() != dims.len() {
        return Err(Error::ArityMismatch {
            neighbors: neighbors.len(),
            dims: dims.len(),
        });
    }
    let mut seen = HashSet::new();
    for (&variable, &dim) in neighbors.iter().zip(dims) {
        if !seen.insert(variable) {
            return Err(Error::DuplicateNeighbor { variable });
        }
        if dim == 0 {
            return Err(Error::EmptyDomain { variable });
        }
    }
    checked_size(dims)
}

fn checked_size(dims: &[usize]) -> Result<usize> {
    table_size(dims).ok_or_else(|| Error::TableTooLarge {
        dims: dims.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DenseVector, FeatureVector, GraphicalModel};

    const EPS: f64 = 1e-12;

    fn table(neighbors: Vec<usize>, dims: Vec<usize>, linear: &[f64]) -> TableFactor {
        TableFactor::from_log_values(neighbors, dims, linear.iter().map(|v| v.ln()).collect())
            .unwrap()
    }

    fn linear(t: &TableFactor) -> Vec<f64> {
        t.log_values().iter().map(|v| v.exp()).collect()
    }

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn new_and_zeros() {
        let ones = TableFactor::new(vec![0, 1], vec![2, 3]).unwrap();
        assert_eq!(ones.len(), 6);
        assert!((ones.value_sum() - 6.0).abs() < EPS);
        let zeros = TableFactor::zeros(vec![0], vec![4]).unwrap();
        assert!(zeros.is_impossible());
        assert_eq!(zeros.value_sum(), 0.0);
    }

    #[test]
    fn shape_errors() {
        assert!(matches!(
            TableFactor::new(vec![0, 0], vec![2, 2]),
            Err(Error::DuplicateNeighbor { variable: 0 })
        ));
        assert!(matches!(
            TableFactor::from_log_values(vec![0], vec![2], vec![0.0]),
            Err(Error::TableSizeMismatch {
                expected: 2,
                found: 1
            })
        ));
        assert!(matches!(
            TableFactor::zeros(vec![0, 1], vec![usize::MAX, 2]),
            Err(Error::TableTooLarge { .. })
        ));
    }

    #[test]
    fn linear_accessors_convert_at_the_boundary() {
        let mut t = TableFactor::new(vec![3, 5], vec![2, 2]).unwrap();
        t.set_assignment_value(&[1, 0], 4.0).unwrap();
        assert!((t.assignment_log_value(&[1, 0]).unwrap() - 4.0f64.ln()).abs() < EPS);
        assert!((t.assignment_value(&[1, 0]).unwrap() - 4.0).abs() < EPS);
        t.set_assignment_value(&[0, 1], 0.0).unwrap();
        assert_eq!(t.assignment_log_value(&[0, 1]).unwrap(), f64::NEG_INFINITY);
        assert!(matches!(
            t.assignment_value(&[2, 0]),
            Err(Error::InvalidAssignment { .. })
        ));
    }

    #[test]
    fn build_from_weights() {
        let mut model = GraphicalModel::new();
        let id = model
            .add_factor_with(vec![0, 1], vec![2, 2], |a| {
                FeatureVector::Dense(vec![a[0] as f64, a[1] as f64])
            })
            .unwrap();
        let weights = DenseVector::new(vec![1.0, 10.0]);
        let t = TableFactor::from_weights(&weights, model.factor(id).unwrap());
        assert_eq!(t.log_values(), &[0.0, 10.0, 1.0, 11.0]);
    }

    #[test]
    fn build_with_observations_drops_clamped_dimensions() {
        let mut model = GraphicalModel::new();
        let id = model
            .add_factor_with(vec![4, 7, 9], vec![2, 3, 2], |a| {
                FeatureVector::Dense(vec![(a[0] * 100 + a[1] * 10 + a[2]) as f64])
            })
            .unwrap();
        let weights = DenseVector::new(vec![1.0]);
        let factor = model.factor(id).unwrap();

        let t = TableFactor::from_weights_observed(&weights, factor, &[None, Some(2), None]).unwrap();
        assert_eq!(t.neighbors(), &[4, 9]);
        assert_eq!(t.log_values(), &[20.0, 21.0, 120.0, 121.0]);

        let scalar =
            TableFactor::from_weights_observed(&weights, factor, &[Some(1), Some(1), Some(0)]).unwrap();
        assert!(scalar.neighbors().is_empty());
        assert_eq!(scalar.log_values(), &[110.0]);

        assert!(matches!(
            TableFactor::from_weights_observed(&weights, factor, &[Some(2), None, None]),
            Err(Error::ObservationOutOfRange { variable: 4, .. })
        ));
    }

    #[test]
    fn multiply_broadcasts_over_union() {
        let a = table(vec![0, 1], vec![2, 2], &[1.0, 2.0, 3.0, 4.0]);
        let b = table(vec![1, 2], vec![2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let product = a.multiply(&b).unwrap();
        assert_eq!(product.neighbors(), &[0, 1, 2]);
        assert_eq!(product.dims(), &[2, 2, 3]);
        for assignment in product.assignments() {
            let expected = a.assignment_value(&assignment[..2]).unwrap()
                * b.assignment_value(&assignment[1..]).unwrap();
            let got = product.assignment_value(&assignment).unwrap();
            assert!((got - expected).abs() < 1e-9, "{assignment:?}");
        }
    }

    #[test]
    fn multiply_rejects_domain_mismatch() {
        let a = TableFactor::new(vec![0], vec![2]).unwrap();
        let b = TableFactor::new(vec![0], vec![3]).unwrap();
        assert!(matches!(
            a.multiply(&b),
            Err(Error::InconsistentDomainSize { variable: 0, .. })
        ));
    }

    #[test]
    fn multiply_with_scalar_and_disjoint() {
        let scalar = TableFactor::from_log_values(vec![], vec![], vec![2.0f64.ln()]).unwrap();
        let a = table(vec![0], vec![2], &[1.0, 3.0]);
        assert!(close(&linear(&a.multiply(&scalar).unwrap()), &[2.0, 6.0]));
        let b = table(vec![1], vec![2], &[5.0, 7.0]);
        assert!(close(&linear(&a.multiply(&b).unwrap()), &[5.0, 7.0, 15.0, 21.0]));
    }

    #[test]
    fn binary_fast_path_matches_general_fold() {
        let t = table(vec![0, 1], vec![2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(close(&linear(&t.sum_out(1).unwrap()), &[6.0, 15.0]));
        assert!(close(&linear(&t.sum_out(0).unwrap()), &[5.0, 7.0, 9.0]));
        assert!(close(&linear(&t.max_out(1).unwrap()), &[3.0, 6.0]));
        assert!(close(&linear(&t.max_out(0).unwrap()), &[4.0, 5.0, 6.0]));
    }

    #[test]
    fn three_way_sum_out_middle() {
        let values: Vec<f64> = (1..=12).map(f64::from).collect();
        let t = table(vec![0, 1, 2], vec![2, 3, 2], &values);
        let out = t.sum_out(1).unwrap();
        assert_eq!(out.neighbors(), &[0, 2]);
        // (a, c) sums over b of values[a*6 + b*2 + c]
        assert!(close(&linear(&out), &[9.0, 12.0, 27.0, 30.0]));
    }

    #[test]
    fn sum_out_is_stable_for_extreme_values() {
        let t = TableFactor::from_log_values(vec![0, 1], vec![2, 2], vec![-1e4, -1e4, 800.0, 800.0])
            .unwrap();
        let out = t.sum_out(1).unwrap();
        assert!((out.log_values()[0] - (-1e4 + 2f64.ln())).abs() < 1e-9);
        assert!((out.log_values()[1] - (800.0 + 2f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn sum_out_of_impossible_row_stays_impossible() {
        let t = TableFactor::from_log_values(
            vec![0, 1],
            vec![2, 2],
            vec![0.0, 0.0, f64::NEG_INFINITY, f64::NEG_INFINITY],
        )
        .unwrap();
        let out = t.sum_out(1).unwrap();
        assert_eq!(out.log_values()[1], f64::NEG_INFINITY);
        let out = t.sum_out(0).unwrap();
        assert_eq!(out.log_values(), &[0.0, 0.0]);
    }

    #[test]
    fn marginalize_unknown_variable() {
        let t = TableFactor::new(vec![0], vec![2]).unwrap();
        assert!(matches!(
            t.sum_out(5),
            Err(Error::UnknownVariable { variable: 5 })
        ));
    }

    #[test]
    fn marginalize_onto_ignores_foreign_variables() {
        let t = table(vec![0, 1, 2], vec![2, 2, 2], &[1.0; 8]);
        let onto = t
            .marginalize_onto(&[2, 0, 42], MarginalizationMode::Sum)
            .unwrap();
        assert_eq!(onto.neighbors(), &[0, 2]);
        assert!(close(&linear(&onto), &[2.0; 4]));
    }

    #[test]
    fn observe_slices() {
        let values: Vec<f64> = (1..=12).map(f64::from).collect();
        let t = table(vec![0, 1, 2], vec![2, 3, 2], &values);
        let sliced = t.observe(1, 2).unwrap();
        assert_eq!(sliced.neighbors(), &[0, 2]);
        assert!(close(&linear(&sliced), &[5.0, 6.0, 11.0, 12.0]));
        assert!(matches!(
            t.observe(1, 3),
            Err(Error::ObservationOutOfRange { .. })
        ));
    }

    #[test]
    fn summed_and_maxed_marginals() {
        let t = table(vec![0, 1], vec![2, 2], &[1.0, 3.0, 2.0, 2.0]);
        let summed = t.summed_marginals();
        assert!(close(&summed[0], &[0.5, 0.5]));
        assert!(close(&summed[1], &[0.375, 0.625]));
        let maxed = t.maxed_marginal(0).unwrap();
        assert!(close(&maxed, &[0.6, 0.4]));
    }

    #[test]
    fn marginal_of_impossible_table_is_uniform() {
        let t = TableFactor::zeros(vec![0, 1], vec![3, 2]).unwrap();
        let m = t.summed_marginals();
        assert!(close(&m[0], &[1.0 / 3.0; 3]));
        assert!(close(&m[1], &[0.5, 0.5]));
    }

    #[test]
    fn normalized_sums_to_one() {
        let t = table(vec![0, 1], vec![2, 2], &[1.0, 3.0, 2.0, 2.0]);
        let n = t.normalized();
        assert!((n.value_sum() - 1.0).abs() < 1e-12);
        assert!((n.assignment_value(&[0, 1]).unwrap() - 0.375).abs() < 1e-12);
        let empty = TableFactor::zeros(vec![0], vec![2]).unwrap().normalized();
        assert!(empty.is_impossible());
    }

    #[test]
    fn argmax_prefers_first_tie() {
        let t = table(vec![0, 1], vec![2, 2], &[1.0, 5.0, 5.0, 2.0]);
        assert_eq!(t.argmax_assignment(), vec![0, 1]);
        assert_eq!(
            t.argmax_assignment_consistent(&[Some(1), None]),
            Some(vec![1, 0])
        );
        assert_eq!(t.argmax_assignment_consistent(&[Some(1)]), None);
    }

    #[test]
    fn mode_display() {
        assert_eq!(MarginalizationMode::Sum.to_string(), "sum");
        assert_eq!(MarginalizationMode::Max.to_string(), "max");
    }
}
