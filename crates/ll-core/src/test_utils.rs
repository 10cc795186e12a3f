//! Test utilities for ll-core.
//!
//! This module provides:
//! - Common assertions
//! - Brute-force oracles that enumerate every joint assignment
//! - Model builders (chains, stars, scoped hyperforests) and proptest
//!   strategies over small random forests

use ll_common::Result;
use ll_math::log_sum_exp;
use proptest::prelude::*;

use crate::assignment::{flat_index, Assignments};
use crate::model::{DenseVector, FeatureVector, GraphicalModel, WeightVector};

// ============================================================================
// Macros
// ============================================================================

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Assert that a Result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(val) => panic!("Expected Err, got Ok: {:?}", val),
            Err(_) => {}
        }
    };
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(val) => panic!("{}: got Ok({:?})", $msg, val),
            Err(_) => {}
        }
    };
}

/// Assert that two floating point numbers are approximately equal.
#[macro_export]
macro_rules! assert_approx_eq {
    ($a:expr, $b:expr) => {
        $crate::assert_approx_eq!($a, $b, 1e-6_f64)
    };
    ($a:expr, $b:expr, $epsilon:expr) => {{
        let a: f64 = $a;
        let b: f64 = $b;
        let eps: f64 = $epsilon;
        let diff = (a - b).abs();
        if diff > eps {
            panic!(
                "assertion failed: `(left ~= right)` (left: `{}`, right: `{}`, diff: `{}`, epsilon: `{}`)",
                a, b, diff, eps
            );
        }
    }};
}

// ============================================================================
// Brute force
// ============================================================================

/// Every assignment of every variable consistent with the observations,
/// with its unnormalized log value.
///
/// Variables no factor touches are held at 0.
pub fn enumerate_joint<W: WeightVector>(
    model: &GraphicalModel<W::Features>,
    weights: &W,
) -> Result<Vec<(Vec<usize>, f64)>> {
    let sizes = model.variable_sizes()?;
    let observed = model.observed_assignments(&sizes)?;
    let domains: Vec<usize> = (0..observed.len())
        .map(|v| match observed[v] {
            Some(_) => 1,
            None => sizes.get(v).copied().flatten().unwrap_or(1),
        })
        .collect();

    let mut joint = Vec::new();
    for free in Assignments::new(&domains) {
        let full: Vec<usize> = free
            .iter()
            .zip(&observed)
            .map(|(f, o)| o.unwrap_or(*f))
            .collect();
        joint.push((full.clone(), assignment_log_value(model, weights, &full)));
    }
    Ok(joint)
}

/// Unnormalized log value of one full assignment.
pub fn assignment_log_value<W: WeightVector>(
    model: &GraphicalModel<W::Features>,
    weights: &W,
    assignment: &[usize],
) -> f64 {
    model
        .factors()
        .map(|(_, factor)| {
            let local: Vec<usize> = factor.neighbors().iter().map(|v| assignment[*v]).collect();
            factor
                .features_at(&local)
                .map_or(f64::NEG_INFINITY, |f| weights.dot(f))
        })
        .sum()
}

/// `ln Z` over the assignments consistent with the observations.
pub fn brute_force_log_partition<W: WeightVector>(
    model: &GraphicalModel<W::Features>,
    weights: &W,
) -> Result<f64> {
    let joint = enumerate_joint(model, weights)?;
    let logs: Vec<f64> = joint.iter().map(|(_, l)| *l).collect();
    Ok(log_sum_exp(&logs))
}

/// Exact marginals, or `None` when every consistent assignment has zero
/// probability.
pub fn brute_force_marginals<W: WeightVector>(
    model: &GraphicalModel<W::Features>,
    weights: &W,
) -> Result<Option<Vec<Vec<f64>>>> {
    let sizes = model.variable_sizes()?;
    let joint = enumerate_joint(model, weights)?;
    let logs: Vec<f64> = joint.iter().map(|(_, l)| *l).collect();
    let log_z = log_sum_exp(&logs);
    if log_z == f64::NEG_INFINITY {
        return Ok(None);
    }

    let mut marginals: Vec<Vec<f64>> = sizes
        .iter()
        .map(|s| vec![0.0; s.unwrap_or(0)])
        .collect();
    for (assignment, log_value) in &joint {
        let p = (log_value - log_z).exp();
        for (v, marginal) in marginals.iter_mut().enumerate() {
            if let Some(slot) = marginal.get_mut(assignment[v]) {
                *slot += p;
            }
        }
    }
    Ok(Some(marginals))
}

/// Highest log value over consistent assignments and one assignment
/// achieving it.
pub fn brute_force_map<W: WeightVector>(
    model: &GraphicalModel<W::Features>,
    weights: &W,
) -> Result<(f64, Vec<usize>)> {
    let joint = enumerate_joint(model, weights)?;
    let mut best = (f64::NEG_INFINITY, vec![0; model.variable_count()]);
    for (assignment, log_value) in joint {
        if log_value > best.0 {
            best = (log_value, assignment);
        }
    }
    Ok(best)
}

// ============================================================================
// Builders
// ============================================================================

/// Features giving every entry of a `dims`-shaped table its own weight,
/// numbered from `offset` in table order.
pub fn entry_indicators(offset: usize, dims: &[usize]) -> impl Fn(&[usize]) -> FeatureVector {
    let dims = dims.to_vec();
    move |assignment| match flat_index(&dims, assignment) {
        Some(index) => FeatureVector::indicator(offset + index),
        None => FeatureVector::Sparse(vec![]),
    }
}

/// Agreement indicator on weight 0.
pub fn agreement(assignment: &[usize]) -> FeatureVector {
    if assignment.windows(2).all(|w| w[0] == w[1]) {
        FeatureVector::indicator(0)
    } else {
        FeatureVector::Sparse(vec![])
    }
}

/// Chain `0 - 1 - ... - (n-1)` of pairwise agreement factors.
pub fn chain(n: usize, domain: usize) -> GraphicalModel<FeatureVector> {
    let mut model = GraphicalModel::new();
    for v in 1..n {
        model
            .add_factor_with(vec![v - 1, v], vec![domain, domain], agreement)
            .unwrap_or_else(|e| panic!("chain factor {v}: {e}"));
    }
    model
}

/// Star with hub 0 and `leaves` agreement factors.
pub fn star(leaves: usize, domain: usize) -> GraphicalModel<FeatureVector> {
    let mut model = GraphicalModel::new();
    for leaf in 1..=leaves {
        model
            .add_factor_with(vec![0, leaf], vec![domain, domain], agreement)
            .unwrap_or_else(|e| panic!("star factor {leaf}: {e}"));
    }
    model
}

/// How variable `v > 0` joins the scopes grown so far.
///
/// Picks are reduced into range when the scope is grown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// A factor of its own, starting a new tree.
    Alone,
    /// A pairwise factor with an earlier variable.
    Pair(usize),
    /// Joins an earlier factor, or pairs with its first variable once that
    /// factor already has three.
    Extend(usize),
}

/// Scopes over variables `0..=growth.len()` whose factor graph has no cycle:
/// every variable enters exactly one new or existing scope.
pub fn grow_scopes(growth: &[Growth]) -> Vec<Vec<usize>> {
    let mut scopes = vec![vec![0]];
    for (i, step) in growth.iter().enumerate() {
        let v = i + 1;
        match *step {
            Growth::Alone => scopes.push(vec![v]),
            Growth::Pair(pick) => scopes.push(vec![pick % v, v]),
            Growth::Extend(pick) => {
                let f = pick % scopes.len();
                if scopes[f].len() < 3 {
                    scopes[f].push(v);
                } else {
                    scopes.push(vec![scopes[f][0], v]);
                }
            }
        }
    }
    scopes
}

/// `scopes` followed by one sub-scope per `Some` in `drops`: the scope at the
/// same position minus one of its variables. Single-variable scopes get none.
pub fn with_subsets(scopes: Vec<Vec<usize>>, drops: &[Option<usize>]) -> Vec<Vec<usize>> {
    let subsets: Vec<Vec<usize>> = scopes
        .iter()
        .zip(drops)
        .filter_map(|(scope, drop)| {
            let drop = (*drop)?;
            (scope.len() >= 2).then(|| {
                let mut subset = scope.clone();
                subset.remove(drop % scope.len());
                subset
            })
        })
        .collect();
    let mut all = scopes;
    all.extend(subsets);
    all
}

/// One factor per scope, preceded with `unaries` by one unary factor per
/// variable; each table entry has its own weight. Returns the model and the
/// weight count.
pub fn scoped_model(
    scopes: &[Vec<usize>],
    domains: &[usize],
    unaries: bool,
) -> (GraphicalModel<FeatureVector>, usize) {
    let mut model = GraphicalModel::new();
    let mut next_weight = 0;
    let unary_scopes = (0..domains.len()).filter(|_| unaries).map(|v| vec![v]);
    for neighbors in unary_scopes.chain(scopes.iter().cloned()) {
        let dims: Vec<usize> = neighbors.iter().map(|v| domains[*v]).collect();
        let features = entry_indicators(next_weight, &dims);
        next_weight += dims.iter().product::<usize>();
        model
            .add_factor_with(neighbors, dims, features)
            .unwrap_or_else(|e| panic!("scoped factor: {e}"));
    }
    (model, next_weight)
}

/// A model and weights for it.
#[derive(Debug, Clone)]
pub struct ModelCase {
    pub model: GraphicalModel<FeatureVector>,
    pub weights: DenseVector,
}

/// Random weight: mostly moderate, occasionally `-inf` (an impossible entry).
pub fn arb_weight() -> impl Strategy<Value = f64> {
    prop_oneof![
        12 => -2.0f64..2.0,
        1 => Just(f64::NEG_INFINITY),
    ]
}

fn arb_growth() -> impl Strategy<Value = Growth> {
    prop_oneof![
        1 => Just(Growth::Alone),
        3 => any::<usize>().prop_map(Growth::Pair),
        2 => any::<usize>().prop_map(Growth::Extend),
    ]
}

/// Random forest-structured model over `1..=max_vars` variables with 2 or 3
/// states: factors over up to three variables, some with a second factor
/// over a subset of their variables, optional unaries, random weights, and
/// random observations.
pub fn arb_forest_case(max_vars: usize) -> impl Strategy<Value = ModelCase> {
    (1..=max_vars.max(1))
        .prop_flat_map(|n| {
            (
                proptest::collection::vec(2usize..=3, n),
                proptest::collection::vec(arb_growth(), n - 1),
                any::<bool>(),
            )
        })
        .prop_flat_map(|(domains, growth, unaries)| {
            let base = grow_scopes(&growth);
            let drops = proptest::collection::vec(
                proptest::option::weighted(0.3, any::<usize>()),
                base.len(),
            );
            (Just(domains), Just(base), drops, Just(unaries))
        })
        .prop_flat_map(|(domains, base, drops, unaries)| {
            let scopes = with_subsets(base, &drops);
            let (model, weight_count) = scoped_model(&scopes, &domains, unaries);
            let observations: Vec<_> = domains
                .iter()
                .map(|d| proptest::option::weighted(0.25, 0..*d))
                .collect();
            (
                Just(model),
                proptest::collection::vec(arb_weight(), weight_count),
                observations,
            )
        })
        .prop_map(|(mut model, weights, observations)| {
            for (v, observed) in observations.into_iter().enumerate() {
                if let Some(value) = observed {
                    model.observe(v, value);
                }
            }
            ModelCase {
                model,
                weights: DenseVector::new(weights),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_eq_accepts_close_values() {
        assert_approx_eq!(1.0, 1.0 + 1e-9);
        assert_approx_eq!(0.5, 0.5001, 1e-3);
    }

    #[test]
    #[should_panic]
    fn approx_eq_rejects_distant_values() {
        assert_approx_eq!(1.0, 1.1);
    }

    #[test]
    fn entry_indicators_number_in_table_order() {
        let features = entry_indicators(10, &[2, 3]);
        assert_eq!(features(&[0, 0]), FeatureVector::indicator(10));
        assert_eq!(features(&[1, 2]), FeatureVector::indicator(15));
    }

    #[test]
    fn grow_scopes_builds_hyperedges() {
        let growth = [
            Growth::Extend(0),
            Growth::Extend(0),
            Growth::Pair(2),
            Growth::Extend(0),
            Growth::Alone,
        ];
        assert_eq!(
            grow_scopes(&growth),
            vec![vec![0, 1, 2], vec![2, 3], vec![0, 4], vec![5]]
        );
    }

    #[test]
    fn with_subsets_drops_one_variable() {
        let scopes = vec![vec![0, 1, 2], vec![2, 3], vec![4]];
        let all = with_subsets(scopes, &[Some(0), None, Some(0)]);
        assert_eq!(all, vec![vec![0, 1, 2], vec![2, 3], vec![4], vec![1, 2]]);
    }

    #[test]
    fn scoped_model_shape() {
        let (model, weights) = scoped_model(&[vec![0, 1, 2], vec![1, 2]], &[2, 3, 2], true);
        assert_eq!(model.factor_count(), 5);
        assert_eq!(weights, 2 + 3 + 2 + 12 + 6);
        assert_eq!(model.variable_sizes().unwrap(), vec![Some(2), Some(3), Some(2)]);
        assert_eq!(model.factor(ll_common::FactorId(4)).unwrap().neighbors(), &[1, 2]);
    }

    #[test]
    fn scoped_model_without_unaries() {
        let (model, weights) = scoped_model(&[vec![0, 1], vec![2, 3]], &[2, 2, 2, 3], false);
        assert_eq!(model.factor_count(), 2);
        assert_eq!(weights, 4 + 6);
        assert_eq!(model.factor(ll_common::FactorId(1)).unwrap().neighbors(), &[2, 3]);
    }

    #[test]
    fn brute_force_chain() {
        let model = chain(3, 2);
        let weights = DenseVector::new(vec![1.0]);
        let e = 1f64.exp();
        let log_z = brute_force_log_partition(&model, &weights).unwrap();
        assert_approx_eq!(log_z, (2.0 * (1.0 + e) * (1.0 + e)).ln(), 1e-12);
        let (best, assignment) = brute_force_map(&model, &weights).unwrap();
        assert_approx_eq!(best, 2.0, 1e-12);
        assert_eq!(assignment, vec![0, 0, 0]);
    }

    #[test]
    fn brute_force_respects_observations() {
        let mut model = star(2, 2);
        model.observe(0, 1);
        let weights = DenseVector::new(vec![1.0]);
        assert_eq!(enumerate_joint(&model, &weights).unwrap().len(), 4);
        let marginals = brute_force_marginals(&model, &weights).unwrap().unwrap();
        assert_eq!(marginals[0][0], 0.0);
        assert_approx_eq!(marginals[0][1], 1.0, 1e-12);
    }
}
