//! Output of sum-product inference.

use std::collections::HashMap;

use ll_common::FactorId;

use super::table_factor::TableFactor;

/// Marginals, partition function, and per-factor joint marginals.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginalResult {
    /// Distribution over each variable's states, indexed by variable id.
    /// Variables that no factor touches have an empty vector.
    pub marginals: Vec<Vec<f64>>,
    /// Normalizing constant Z.
    pub partition_function: f64,
    /// `ln Z`, which stays finite when Z itself overflows.
    pub log_partition_function: f64,
    /// Normalized joint distribution over each model factor's variables.
    pub joint_marginals: HashMap<FactorId, TableFactor>,
}

impl MarginalResult {
    /// Marginal of one variable, if it has a known domain.
    pub fn marginal(&self, variable: usize) -> Option<&[f64]> {
        self.marginals
            .get(variable)
            .filter(|m| !m.is_empty())
            .map(Vec::as_slice)
    }

    /// Joint marginal of one model factor.
    pub fn joint_marginal(&self, factor: FactorId) -> Option<&TableFactor> {
        self.joint_marginals.get(&factor)
    }
}
