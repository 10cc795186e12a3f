//! Exact inference by two-pass message passing over a clique forest.
//!
//! Every model factor with at least one unobserved neighbor becomes a clique:
//! its [`TableFactor`] scored against the weights with observed neighbors
//! clamped away. Fully observed factors contribute only a constant to the
//! partition function.
//!
//! # Algorithm
//!
//! 1. Build (or fetch from the factor cache) one table per clique
//! 2. Short-circuit to a uniform result if an observation is impossible
//! 3. Discover the forest of cliques (see [`super::forest`])
//! 4. Pass messages from leaves to roots, then from roots to leaves
//! 5. Multiply each clique by its incoming messages to get converged tables
//! 6. Read marginals, joint marginals, the partition function, or decode MAP
//!
//! Incoming messages are always combined in ascending clique order, so a
//! message depends only on the forest and the tables on its sending side.
//! That is what lets the message cache hand back the previous call's
//! messages without changing a single bit of the result.
//!
//! # Example
//!
//! ```rust
//! use ll_core::inference::CliqueTree;
//! use ll_core::model::{DenseVector, FeatureVector, GraphicalModel};
//!
//! let mut model = GraphicalModel::new();
//! for (a, b) in [(0, 1), (1, 2)] {
//!     model
//!         .add_factor_with(vec![a, b], vec![2, 2], |x| {
//!             if x[0] == x[1] {
//!                 FeatureVector::indicator(0)
//!             } else {
//!                 FeatureVector::Sparse(vec![])
//!             }
//!         })
//!         .unwrap();
//! }
//! model.observe(0, 1);
//!
//! let mut tree = CliqueTree::new(&DenseVector::new(vec![1.0]));
//! let result = tree.calculate_marginals(&model).unwrap();
//! assert!(result.marginals[1][1] > 0.5);
//! assert_eq!(tree.calculate_map(&model).unwrap(), vec![1, 1, 1]);
//! ```

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use ll_common::{Error, FactorId, InferenceConfig, Result};
use ll_math::uniform;
use tracing::{debug, trace, warn};

use super::cache::{CacheStats, FactorCache, MessageCache, ReusePlan};
use super::forest::Forest;
use super::result::MarginalResult;
use super::table_factor::{MarginalizationMode, TableFactor};
use crate::model::{GraphicalModel, ModelFactor, WeightVector};

/// One clique: a model factor's table over its unobserved neighbors.
#[derive(Debug, Clone)]
struct Clique {
    id: FactorId,
    table: Arc<TableFactor>,
    version: u64,
}

/// Per-call view of the model after clamping observations.
#[derive(Debug)]
struct Prepared {
    sizes: Vec<Option<usize>>,
    observed: Vec<Option<usize>>,
    cliques: Vec<Clique>,
    /// Sum of the log values of fully observed factors.
    observed_log_value: f64,
    /// Some clique or fully observed factor has no mass.
    impossible: bool,
}

/// Converged tables of one completed message-passing run.
#[derive(Debug)]
struct Propagated {
    forest: Forest,
    converged: Vec<TableFactor>,
    /// Log value sum (or log max) of each tree.
    tree_log_values: Vec<f64>,
}

/// Exact inference engine bound to one weight vector.
///
/// Holds the factor and message caches, so one instance should be reused
/// across calls on the same (slowly changing) model. Not meant to be shared
/// between threads; use one instance per thread.
#[derive(Debug)]
pub struct CliqueTree<W: WeightVector> {
    weights: W,
    config: InferenceConfig,
    factor_cache: FactorCache,
    message_cache: MessageCache,
    stats: CacheStats,
}

impl<W: WeightVector> CliqueTree<W> {
    /// Create an engine with default configuration.
    ///
    /// The weights are cloned; later changes to the caller's vector do not
    /// affect this engine.
    pub fn new(weights: &W) -> Self {
        Self::build(weights, InferenceConfig::default())
    }

    /// Create an engine with `config`, which must pass
    /// [`InferenceConfig::validate`].
    pub fn with_config(weights: &W, config: InferenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(weights, config))
    }

    fn build(weights: &W, config: InferenceConfig) -> Self {
        Self {
            weights: weights.clone(),
            config,
            factor_cache: FactorCache::default(),
            message_cache: MessageCache::default(),
            stats: CacheStats::default(),
        }
    }

    pub fn weights(&self) -> &W {
        &self.weights
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Cumulative cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.stats
    }

    /// Drop every cached table and message.
    pub fn clear_caches(&mut self) {
        self.factor_cache.clear();
        self.message_cache.clear();
    }

    /// Marginals, joint marginals, and the partition function.
    pub fn calculate_marginals(
        &mut self,
        model: &GraphicalModel<W::Features>,
    ) -> Result<MarginalResult> {
        let (prepared, propagated) = self.run(model, MarginalizationMode::Sum)?;
        let Some(propagated) = propagated else {
            return degenerate_result(model, &prepared);
        };

        let marginals = variable_marginals(&prepared, &propagated)?;
        let joint_marginals = joint_marginals(model, &prepared, &propagated)?;
        let log_partition_function =
            propagated.tree_log_values.iter().sum::<f64>() + prepared.observed_log_value;
        Ok(MarginalResult {
            marginals,
            partition_function: log_partition_function.exp(),
            log_partition_function,
            joint_marginals,
        })
    }

    /// Variable marginals only.
    pub fn calculate_marginals_just_singletons(
        &mut self,
        model: &GraphicalModel<W::Features>,
    ) -> Result<Vec<Vec<f64>>> {
        let (prepared, propagated) = self.run(model, MarginalizationMode::Sum)?;
        match propagated {
            Some(propagated) => variable_marginals(&prepared, &propagated),
            None => Ok(uniform_marginals(&prepared)),
        }
    }

    /// Most probable state of every variable.
    ///
    /// Observed variables get their clamped value; variables no factor
    /// touches get 0.
    pub fn calculate_map(&mut self, model: &GraphicalModel<W::Features>) -> Result<Vec<usize>> {
        let (prepared, propagated) = self.run(model, MarginalizationMode::Max)?;
        let assignment = match propagated {
            Some(propagated) => decode(&prepared, &propagated),
            None => prepared.observed.clone(),
        };
        Ok(assignment.into_iter().map(|a| a.unwrap_or(0)).collect())
    }

    fn run(
        &mut self,
        model: &GraphicalModel<W::Features>,
        mode: MarginalizationMode,
    ) -> Result<(Prepared, Option<Propagated>)> {
        let prepared = self.prepare(model)?;
        debug!(
            model = %model.id(),
            %mode,
            factors = model.factor_count(),
            cliques = prepared.cliques.len(),
            "running clique tree inference"
        );

        if prepared.impossible {
            debug!(model = %model.id(), %mode, "impossible observation, returning uniform result");
            self.message_cache.invalidate(mode);
            return Ok((prepared, None));
        }

        let propagated = self.propagate(&prepared, mode)?;
        Ok((prepared, propagated))
    }

    /// Clamp observations and build every clique table.
    fn prepare(&mut self, model: &GraphicalModel<W::Features>) -> Result<Prepared> {
        let sizes = model.variable_sizes()?;
        let observed = model.observed_assignments(&sizes)?;
        self.factor_cache.scope_to(model.id());
        self.message_cache.scope_to(model.id());

        let mut cliques = Vec::new();
        let mut observed_log_value = 0.0;
        let mut impossible = false;

        for (id, factor) in model.factors() {
            let clamp: Vec<Option<usize>> = factor.neighbors().iter().map(|v| observed[*v]).collect();

            if clamp.iter().all(Option::is_some) {
                let assignment: Vec<usize> = clamp.iter().flatten().copied().collect();
                let log_value = factor
                    .features_at(&assignment)
                    .map_or(f64::NEG_INFINITY, |f| self.weights.dot(f));
                if log_value.is_nan() {
                    return Err(Error::NumericalInstability(format!(
                        "factor {id} scores NaN at observed assignment {assignment:?}"
                    )));
                }
                if log_value == f64::NEG_INFINITY {
                    debug!(factor = %id, ?assignment, "fully observed factor has zero probability");
                    impossible = true;
                }
                observed_log_value += log_value;
                continue;
            }

            let (table, version) = if self.config.cache_factors {
                let weights = &self.weights;
                self.factor_cache
                    .get_or_build(id, &clamp, &mut self.stats, || {
                        score(weights, factor, &clamp, id)
                    })?
            } else {
                self.stats.factor_misses += 1;
                let table = score(&self.weights, factor, &clamp, id)?;
                (Arc::new(table), self.factor_cache.fresh_version())
            };

            if table.is_impossible() {
                debug!(factor = %id, "clique has zero probability after clamping");
                impossible = true;
            }
            cliques.push(Clique { id, table, version });
        }

        Ok(Prepared {
            sizes,
            observed,
            cliques,
            observed_log_value,
            impossible,
        })
    }

    /// Discover the forest and run both passes.
    ///
    /// Returns `None` when some tree has no mass at all.
    fn propagate(&mut self, prepared: &Prepared, mode: MarginalizationMode) -> Result<Option<Propagated>> {
        let cliques = &prepared.cliques;
        let scopes: Vec<Vec<usize>> = cliques.iter().map(|c| c.table.neighbors().to_vec()).collect();
        let ids: Vec<FactorId> = cliques.iter().map(|c| c.id).collect();
        let keys: Vec<(FactorId, u64)> = cliques.iter().map(|c| (c.id, c.version)).collect();

        let mut plan = if self.config.cache_messages {
            self.message_cache.plan(mode, &keys)
        } else {
            None
        };
        let mut forest = Forest::build(&scopes, &ids)?;

        let edges: BTreeSet<(FactorId, FactorId)> = forest
            .edges()
            .into_iter()
            .map(|(a, b)| (ids[a], ids[b]))
            .collect();
        if plan.as_ref().is_some_and(|p| !p.matches_edges(&edges)) {
            debug!(%mode, "message cache miss: forest changed");
            plan = None;
        }
        // Rooting the changed tree at the changed clique leaves every upward
        // message independent of it. The edges, and so every bit of the
        // result, are those of a full recomputation.
        let changed = plan.as_ref().and_then(|p| p.changed);
        if let Some(c) = changed {
            forest.reroot(c);
        }
        debug!(
            trees = forest.trees.len(),
            reuse = plan.is_some(),
            changed = ?changed.map(|c| ids[c]),
            "forest discovered"
        );

        let changed_tree = changed.map(|c| forest.tree_of[c]);
        let mut messages: HashMap<(usize, usize), TableFactor> = HashMap::new();
        for (tree_index, tree) in forest.trees.iter().enumerate() {
            // Downward messages of the changed tree all depend on its root.
            let reuse_down = changed_tree != Some(tree_index);

            for child in tree.upward_order() {
                let Some(parent) = forest.parents[child] else {
                    continue;
                };
                let message =
                    self.message(&mut plan, true, cliques, &forest, &messages, child, parent, mode)?;
                messages.insert((child, parent), message);
            }
            for from in tree.downward_order() {
                for &to in &forest.children[from] {
                    let message =
                        self.message(&mut plan, reuse_down, cliques, &forest, &messages, from, to, mode)?;
                    messages.insert((from, to), message);
                }
            }
        }

        let converged = cliques
            .iter()
            .enumerate()
            .map(|(c, clique)| incoming_product(&clique.table, &forest, &messages, c, None))
            .collect::<Result<Vec<_>>>()?;

        if self.config.cache_messages {
            let keyed = messages
                .into_iter()
                .map(|((from, to), m)| ((ids[from], ids[to]), m))
                .collect();
            self.message_cache.record(mode, keys, edges, keyed);
        }

        let mut tree_log_values = Vec::with_capacity(forest.trees.len());
        for tree in &forest.trees {
            let Some(&first) = tree.nodes.iter().min() else {
                continue;
            };
            let log_value = tree_mass(&converged[first], mode);
            if log_value == f64::NEG_INFINITY {
                debug!(tree_root = %ids[tree.root], "tree has zero total mass, returning uniform result");
                self.message_cache.invalidate(mode);
                return Ok(None);
            }
            self.check_consistency(tree.nodes.iter().map(|c| (ids[*c], &converged[*c])), log_value, mode);
            tree_log_values.push(log_value);
        }

        Ok(Some(Propagated {
            forest,
            converged,
            tree_log_values,
        }))
    }

    /// Message from clique `from` to clique `to`, reused when allowed.
    #[allow(clippy::too_many_arguments)]
    fn message(
        &mut self,
        plan: &mut Option<ReusePlan>,
        reusable: bool,
        cliques: &[Clique],
        forest: &Forest,
        messages: &HashMap<(usize, usize), TableFactor>,
        from: usize,
        to: usize,
        mode: MarginalizationMode,
    ) -> Result<TableFactor> {
        if reusable {
            if let Some(cached) = plan
                .as_mut()
                .and_then(|p| p.take(cliques[from].id, cliques[to].id))
            {
                self.stats.message_hits += 1;
                return Ok(cached);
            }
        }
        self.stats.message_misses += 1;
        trace!(from = %cliques[from].id, to = %cliques[to].id, %mode, "computing message");
        let product = incoming_product(&cliques[from].table, forest, messages, from, Some(to))?;
        product.marginalize_onto(cliques[to].table.neighbors(), mode)
    }

    /// Every converged clique of a tree must carry the same mass.
    fn check_consistency<'a>(
        &self,
        tables: impl Iterator<Item = (FactorId, &'a TableFactor)>,
        expected: f64,
        mode: MarginalizationMode,
    ) {
        let tolerance = self.config.partition_tolerance * expected.abs().max(1.0);
        for (id, table) in tables {
            let found = tree_mass(table, mode);
            let consistent = (found - expected).abs() <= tolerance;
            if !consistent {
                warn!(
                    factor = %id,
                    expected,
                    found,
                    %mode,
                    "converged cliques disagree on tree mass"
                );
            }
            debug_assert!(
                consistent,
                "clique {id} reports log mass {found}, tree has {expected}"
            );
        }
    }
}

/// Clique table for one factor; a NaN entry is an error.
fn score<W: WeightVector>(
    weights: &W,
    factor: &ModelFactor<W::Features>,
    clamp: &[Option<usize>],
    id: FactorId,
) -> Result<TableFactor> {
    let table = TableFactor::from_weights_observed(weights, factor, clamp)?;
    if table.log_values().iter().any(|v| v.is_nan()) {
        return Err(Error::NumericalInstability(format!(
            "factor {id} scores NaN under the current weights"
        )));
    }
    Ok(table)
}

fn tree_mass(table: &TableFactor, mode: MarginalizationMode) -> f64 {
    match mode {
        MarginalizationMode::Sum => table.log_value_sum(),
        MarginalizationMode::Max => table.max_log_value(),
    }
}

/// `table` times every message into `clique` except the one from `except`,
/// in ascending sender order.
fn incoming_product(
    table: &TableFactor,
    forest: &Forest,
    messages: &HashMap<(usize, usize), TableFactor>,
    clique: usize,
    except: Option<usize>,
) -> Result<TableFactor> {
    let mut product = table.clone();
    for sender in forest.adjacent(clique) {
        if Some(sender) == except {
            continue;
        }
        let message = messages.get(&(sender, clique));
        debug_assert!(message.is_some(), "message {sender} -> {clique} missing");
        if let Some(message) = message {
            product = product.multiply(message)?;
        }
    }
    Ok(product)
}

/// One-hot at the observed state for clamped variables, the converged
/// clique's marginal for the rest.
fn variable_marginals(prepared: &Prepared, propagated: &Propagated) -> Result<Vec<Vec<f64>>> {
    let mut first_clique: HashMap<usize, usize> = HashMap::new();
    for (c, clique) in prepared.cliques.iter().enumerate() {
        for &variable in clique.table.neighbors() {
            first_clique.entry(variable).or_insert(c);
        }
    }

    let mut marginals = vec![Vec::new(); prepared.observed.len()];
    for (variable, slot) in marginals.iter_mut().enumerate() {
        let Some(domain) = prepared.sizes.get(variable).copied().flatten() else {
            continue;
        };
        if let Some(value) = prepared.observed[variable] {
            let mut one_hot = vec![0.0; domain];
            one_hot[value] = 1.0;
            *slot = one_hot;
        } else if let Some(&c) = first_clique.get(&variable) {
            *slot = propagated.converged[c].summed_marginal(variable)?;
        }
    }
    Ok(marginals)
}

/// Normalized converged clique re-embedded over the full factor, with
/// observed neighbors fixed at their clamped values.
fn joint_marginals<F>(
    model: &GraphicalModel<F>,
    prepared: &Prepared,
    propagated: &Propagated,
) -> Result<HashMap<FactorId, TableFactor>> {
    let clique_of: HashMap<FactorId, usize> = prepared
        .cliques
        .iter()
        .enumerate()
        .map(|(c, clique)| (clique.id, c))
        .collect();

    let mut joints = HashMap::with_capacity(model.factor_count());
    for (id, factor) in model.factors() {
        let clamp: Vec<Option<usize>> = factor
            .neighbors()
            .iter()
            .map(|v| prepared.observed[*v])
            .collect();
        let mut joint = TableFactor::zeros(factor.neighbors().to_vec(), factor.dims().to_vec())?;
        let mut full: Vec<usize> = clamp.iter().map(|o| o.unwrap_or(0)).collect();

        match clique_of.get(&id) {
            Some(&c) => {
                let normalized = propagated.converged[c].normalized();
                let free: Vec<usize> = (0..clamp.len()).filter(|p| clamp[*p].is_none()).collect();
                for (assignment, &log_value) in normalized.assignments().zip(normalized.log_values()) {
                    for (value, pos) in assignment.iter().zip(&free) {
                        full[*pos] = *value;
                    }
                    joint.set_assignment_log_value(&full, log_value)?;
                }
            }
            None => joint.set_assignment_log_value(&full, 0.0)?,
        }
        joints.insert(id, joint);
    }
    Ok(joints)
}

/// Back-track a MAP assignment through each tree.
///
/// Each tree is walked breadth-first from its lowest-positioned clique; every
/// clique takes the best entry of its max-marginal table that agrees with the
/// variables already fixed.
fn decode(prepared: &Prepared, propagated: &Propagated) -> Vec<Option<usize>> {
    let forest = &propagated.forest;
    let mut assignment = prepared.observed.clone();
    let mut reached = vec![false; forest.len()];

    for tree in &forest.trees {
        let Some(&start) = tree.nodes.iter().min() else {
            continue;
        };
        reached[start] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(c) = queue.pop_front() {
            let table = &propagated.converged[c];
            let fixed: Vec<Option<usize>> = table.neighbors().iter().map(|v| assignment[*v]).collect();
            let best = table
                .argmax_assignment_consistent(&fixed)
                .unwrap_or_else(|| table.argmax_assignment());
            for (&variable, value) in table.neighbors().iter().zip(best) {
                assignment[variable].get_or_insert(value);
            }
            for next in forest.adjacent(c) {
                if !reached[next] {
                    reached[next] = true;
                    queue.push_back(next);
                }
            }
        }
    }
    assignment
}

fn uniform_marginals(prepared: &Prepared) -> Vec<Vec<f64>> {
    (0..prepared.observed.len())
        .map(|v| {
            prepared
                .sizes
                .get(v)
                .copied()
                .flatten()
                .map_or_else(Vec::new, uniform)
        })
        .collect()
}

/// Result for a model whose observations have zero probability: uniform
/// marginals, all-zero joint tables, and Z = 1.
fn degenerate_result<F>(model: &GraphicalModel<F>, prepared: &Prepared) -> Result<MarginalResult> {
    let joint_marginals = model
        .factors()
        .map(|(id, factor)| {
            TableFactor::zeros(factor.neighbors().to_vec(), factor.dims().to_vec()).map(|t| (id, t))
        })
        .collect::<Result<HashMap<_, _>>>()?;
    Ok(MarginalResult {
        marginals: uniform_marginals(prepared),
        partition_function: 1.0,
        log_partition_function: 0.0,
        joint_marginals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DenseVector, FeatureVector};

    fn agreement(a: &[usize]) -> FeatureVector {
        if a[0] == a[1] {
            FeatureVector::indicator(0)
        } else {
            FeatureVector::Sparse(vec![])
        }
    }

    fn chain(n: usize) -> GraphicalModel<FeatureVector> {
        let mut model = GraphicalModel::new();
        for v in 0..n - 1 {
            model.add_factor_with(vec![v, v + 1], vec![2, 2], agreement).unwrap();
        }
        model
    }

    fn weights() -> DenseVector {
        DenseVector::new(vec![1.0])
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn single_factor_marginals() {
        let mut model = GraphicalModel::new();
        model
            .add_static_factor(vec![0], vec![2], |a| if a[0] == 1 { 3f64.ln() } else { 0.0 })
            .unwrap();
        let mut tree = CliqueTree::new(&weights());
        let result = tree.calculate_marginals(&model).unwrap();
        assert!(close(result.marginals[0][0], 0.25));
        assert!(close(result.marginals[0][1], 0.75));
        assert!(close(result.partition_function, 4.0));
        assert!(close(result.log_partition_function, 4f64.ln()));
    }

    #[test]
    fn chain_partition_function() {
        // Z = sum over 8 assignments of e^(#agreeing edges) = 2 * (1 + e)^2
        let model = chain(3);
        let mut tree = CliqueTree::new(&weights());
        let result = tree.calculate_marginals(&model).unwrap();
        let e = 1f64.exp();
        assert!(close(result.partition_function, 2.0 * (1.0 + e).powi(2)));
        for marginal in &result.marginals {
            assert!(close(marginal[0], 0.5));
        }
    }

    #[test]
    fn observation_shifts_marginals_and_clamps_map() {
        let mut model = chain(3);
        model.observe(0, 1);
        let mut tree = CliqueTree::new(&weights());
        let result = tree.calculate_marginals(&model).unwrap();
        assert_eq!(result.marginals[0], vec![0.0, 1.0]);
        let e = 1f64.exp();
        assert!(close(result.marginals[1][1], e / (1.0 + e)));
        assert_eq!(tree.calculate_map(&model).unwrap(), vec![1, 1, 1]);
    }

    #[test]
    fn joint_marginal_embeds_observed_neighbor() {
        let mut model = chain(3);
        model.observe(1, 0);
        let mut tree = CliqueTree::new(&weights());
        let result = tree.calculate_marginals(&model).unwrap();
        let joint = result.joint_marginal(FactorId(0)).unwrap();
        assert_eq!(joint.neighbors(), &[0, 1]);
        assert_eq!(joint.assignment_value(&[0, 1]).unwrap(), 0.0);
        assert_eq!(joint.assignment_value(&[1, 1]).unwrap(), 0.0);
        let e = 1f64.exp();
        assert!(close(joint.assignment_value(&[0, 0]).unwrap(), e / (1.0 + e)));
        assert!(close(joint.value_sum(), 1.0));
    }

    #[test]
    fn fully_observed_factor_gets_one_hot_joint_and_scales_z() {
        let mut model = chain(2);
        model.observe(0, 1);
        model.observe(1, 1);
        let mut tree = CliqueTree::new(&weights());
        let result = tree.calculate_marginals(&model).unwrap();
        let joint = result.joint_marginal(FactorId(0)).unwrap();
        assert_eq!(joint.assignment_value(&[1, 1]).unwrap(), 1.0);
        assert!(close(joint.value_sum(), 1.0));
        assert!(close(result.log_partition_function, 1.0));
    }

    #[test]
    fn impossible_observation_is_uniform() {
        let mut model = GraphicalModel::new();
        model
            .add_static_factor(vec![0, 1], vec![2, 2], |a| {
                if a == [1, 1] {
                    f64::NEG_INFINITY
                } else {
                    0.0
                }
            })
            .unwrap();
        model.observe(0, 1);
        model.observe(1, 1);
        let mut tree = CliqueTree::new(&weights());
        let result = tree.calculate_marginals(&model).unwrap();
        assert_eq!(result.marginals, vec![vec![0.5, 0.5], vec![0.5, 0.5]]);
        assert_eq!(result.partition_function, 1.0);
        assert!(result.joint_marginal(FactorId(0)).unwrap().is_impossible());
        assert_eq!(tree.calculate_map(&model).unwrap(), vec![1, 1]);
    }

    #[test]
    fn partially_observed_impossible_clique_is_uniform() {
        let mut model = GraphicalModel::new();
        model
            .add_static_factor(vec![0, 1], vec![2, 2], |a| {
                if a[0] == 1 {
                    f64::NEG_INFINITY
                } else {
                    0.0
                }
            })
            .unwrap();
        model.observe(0, 1);
        let mut tree = CliqueTree::new(&weights());
        let marginals = tree.calculate_marginals_just_singletons(&model).unwrap();
        assert_eq!(marginals[1], vec![0.5, 0.5]);
        assert!(marginals.iter().flatten().all(|p| p.is_finite()));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut model = chain(3);
        model.add_factor_with(vec![2, 0], vec![2, 2], agreement).unwrap();
        let mut tree = CliqueTree::new(&weights());
        assert!(matches!(
            tree.calculate_marginals(&model),
            Err(Error::StructuralViolation { .. })
        ));
    }

    #[test]
    fn observing_a_cycle_variable_breaks_the_cycle() {
        let mut model = chain(3);
        model.add_factor_with(vec![2, 0], vec![2, 2], agreement).unwrap();
        model.observe(0, 0);
        let mut tree = CliqueTree::new(&weights());
        assert!(tree.calculate_marginals(&model).is_ok());
    }

    #[test]
    fn weights_are_cloned() {
        let mut w = weights();
        let tree = CliqueTree::new(&w);
        w.as_mut_slice()[0] = 100.0;
        assert_eq!(tree.weights().get(0), 1.0);
    }

    #[test]
    fn repeated_calls_hit_caches_and_match() {
        let model = chain(4);
        let mut tree = CliqueTree::new(&weights());
        let first = tree.calculate_marginals(&model).unwrap();
        let second = tree.calculate_marginals(&model).unwrap();
        assert_eq!(first, second);
        let stats = tree.cache_stats();
        assert_eq!(stats.factor_hits, 3);
        assert_eq!(stats.message_hits, 4);
    }

    #[test]
    fn cache_is_scoped_to_model_instance() {
        let model = chain(3);
        let copy = model.clone();
        let mut tree = CliqueTree::new(&weights());
        tree.calculate_marginals(&model).unwrap();
        tree.calculate_marginals(&copy).unwrap();
        assert_eq!(tree.cache_stats().factor_hits, 0);
    }

    #[test]
    fn uncached_engine_matches_cached() {
        let mut model = chain(4);
        let mut cached = CliqueTree::new(&weights());
        let mut uncached =
            CliqueTree::with_config(&weights(), InferenceConfig::uncached()).unwrap();
        cached.calculate_marginals(&model).unwrap();
        model.observe(3, 0);
        let a = cached.calculate_marginals(&model).unwrap();
        let b = uncached.calculate_marginals(&model).unwrap();
        assert_eq!(a.marginals, b.marginals);
        assert_eq!(uncached.cache_stats().message_hits, 0);
    }

    #[test]
    fn nan_tolerance_is_rejected() {
        let config = InferenceConfig {
            partition_tolerance: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            CliqueTree::with_config(&weights(), config),
            Err(Error::InvalidConfig { .. })
        ));

        let config = InferenceConfig {
            partition_tolerance: 0.0,
            ..Default::default()
        };
        let mut tree = CliqueTree::with_config(&weights(), config).unwrap();
        assert!(tree.calculate_marginals(&chain(3)).is_ok());
    }

    #[test]
    fn nan_score_is_an_error() {
        let mut model = GraphicalModel::new();
        model
            .add_factor(
                vec![0],
                vec![2],
                vec![FeatureVector::indicator(0), FeatureVector::Sparse(vec![(0, 0.0)])],
            )
            .unwrap();
        let mut tree = CliqueTree::new(&DenseVector::new(vec![f64::NEG_INFINITY]));
        assert!(matches!(
            tree.calculate_marginals(&model),
            Err(Error::NumericalInstability(_))
        ));
    }

    #[test]
    fn empty_model() {
        let model: GraphicalModel<FeatureVector> = GraphicalModel::new();
        let mut tree = CliqueTree::new(&weights());
        let result = tree.calculate_marginals(&model).unwrap();
        assert!(result.marginals.is_empty());
        assert_eq!(result.partition_function, 1.0);
        assert!(tree.calculate_map(&model).unwrap().is_empty());
    }
}
