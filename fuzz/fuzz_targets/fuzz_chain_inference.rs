//! Fuzz target for clique-tree inference on small chains.
//!
//! Builds a chain from arbitrary domains, log values, and observations, then
//! checks that marginals are finite distributions and that MAP respects the
//! observations.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ll_common::InferenceConfig;
use ll_core::inference::CliqueTree;
use ll_core::model::{DenseVector, FeatureVector, GraphicalModel};

#[derive(Debug, Arbitrary)]
struct ChainInput {
    domains: Vec<u8>,
    log_values: Vec<f64>,
    observations: Vec<Option<u8>>,
    cached: bool,
}

/// Keep values in a range where sums cannot overflow; anything non-finite
/// becomes an impossible entry.
fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-50.0, 50.0)
    } else {
        f64::NEG_INFINITY
    }
}

fuzz_target!(|input: ChainInput| {
    let domains: Vec<usize> = input
        .domains
        .iter()
        .take(6)
        .map(|d| usize::from(d % 4) + 1)
        .collect();
    if domains.len() < 2 || input.log_values.is_empty() {
        return;
    }

    let mut values = input.log_values.iter().copied().map(sanitize).cycle();
    let mut model: GraphicalModel<FeatureVector> = GraphicalModel::new();
    for v in 1..domains.len() {
        let dims = vec![domains[v - 1], domains[v]];
        model
            .add_static_factor(vec![v - 1, v], dims, |_| values.next().unwrap_or(0.0))
            .expect("chain factor is valid");
    }
    for (v, observed) in input.observations.iter().take(domains.len()).enumerate() {
        if let Some(value) = observed {
            model.observe(v, usize::from(*value) % domains[v]);
        }
    }

    let config = if input.cached {
        InferenceConfig::default()
    } else {
        InferenceConfig::uncached()
    };
    let weights = DenseVector::default();
    let mut tree: CliqueTree<DenseVector> =
        CliqueTree::with_config(&weights, config).expect("default tolerance is valid");

    let result = tree.calculate_marginals(&model).expect("chains are trees");
    for (v, marginal) in result.marginals.iter().enumerate() {
        assert_eq!(marginal.len(), domains[v]);
        let total: f64 = marginal.iter().sum();
        assert!((total - 1.0).abs() < 1e-9, "variable {v} sums to {total}");
        assert!(marginal.iter().all(|p| p.is_finite()));
    }

    let map = tree.calculate_map(&model).expect("chains are trees");
    assert_eq!(map.len(), domains.len());
    for (v, value) in map.iter().enumerate() {
        assert!(*value < domains[v]);
        if let Some(observed) = model.observed_value(v).expect("observation parses") {
            assert_eq!(*value, observed);
        }
    }
});
