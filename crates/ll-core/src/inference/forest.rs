//! Forest discovery over cliques.
//!
//! Cliques are visited breadth-first from a root. A candidate child is
//! attached to a parent only if every variable it shares with an
//! already-visited clique also belongs to that parent, which keeps the
//! running-intersection property. A clique that cannot be attached anywhere
//! and still shares a variable with a visited clique means the cliques do not
//! form a forest.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use ll_common::{Error, FactorId, Result};
use tracing::trace;

/// One connected component of the forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForestTree {
    /// Clique the traversal started from.
    pub root: usize,
    /// Cliques in visitation order, root first.
    pub nodes: Vec<usize>,
}

impl ForestTree {
    /// Non-root cliques from the leaves up (for the upward pass).
    pub fn upward_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().skip(1).rev().copied()
    }

    /// Cliques from the root down (for the downward pass).
    pub fn downward_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().copied()
    }
}

/// Parent/child structure over clique positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forest {
    pub trees: Vec<ForestTree>,
    /// Parent of each clique, `None` for roots.
    pub parents: Vec<Option<usize>>,
    /// Children of each clique in attachment order.
    pub children: Vec<Vec<usize>>,
    /// Index into `trees` for each clique.
    pub tree_of: Vec<usize>,
}

impl Forest {
    /// Discover the forest over `scopes` (the variables of each clique).
    ///
    /// Roots are tried in ascending order. `ids` names each clique in errors.
    pub fn build(scopes: &[Vec<usize>], ids: &[FactorId]) -> Result<Self> {
        let n = scopes.len();
        let mut by_variable: HashMap<usize, Vec<usize>> = HashMap::new();
        for (clique, scope) in scopes.iter().enumerate() {
            for &variable in scope {
                by_variable.entry(variable).or_default().push(clique);
            }
        }

        let mut parents = vec![None; n];
        let mut children = vec![Vec::new(); n];
        let mut tree_of = vec![0; n];
        let mut visited = vec![false; n];
        let mut seen_variables: HashSet<usize> = HashSet::new();
        let mut trees = Vec::new();

        for root in 0..n {
            if visited[root] {
                continue;
            }
            if let Some(variable) = scopes[root].iter().find(|v| seen_variables.contains(v)) {
                return Err(Error::StructuralViolation {
                    factor: ids[root],
                    message: format!(
                        "variable {variable} is shared with another clique, but no attachment \
                         preserves the running intersection (the model has a cycle)"
                    ),
                });
            }

            let tree_index = trees.len();
            let mut nodes = vec![root];
            visited[root] = true;
            tree_of[root] = tree_index;
            seen_variables.extend(scopes[root].iter().copied());

            let mut queue = VecDeque::from([root]);
            while let Some(parent) = queue.pop_front() {
                let adjacent: BTreeSet<usize> = scopes[parent]
                    .iter()
                    .filter_map(|v| by_variable.get(v))
                    .flatten()
                    .copied()
                    .filter(|c| !visited[*c])
                    .collect();

                for child in adjacent {
                    let attachable = scopes[child]
                        .iter()
                        .filter(|v| seen_variables.contains(v))
                        .all(|v| scopes[parent].contains(v));
                    if !attachable {
                        trace!(
                            child = %ids[child],
                            parent = %ids[parent],
                            "deferring clique: shared variables not covered by parent"
                        );
                        continue;
                    }
                    visited[child] = true;
                    parents[child] = Some(parent);
                    children[parent].push(child);
                    tree_of[child] = tree_index;
                    seen_variables.extend(scopes[child].iter().copied());
                    nodes.push(child);
                    queue.push_back(child);
                }
            }

            trees.push(ForestTree { root, nodes });
        }

        Ok(Self {
            trees,
            parents,
            children,
            tree_of,
        })
    }

    /// Number of cliques.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Parent and children of `clique`, ascending.
    pub fn adjacent(&self, clique: usize) -> Vec<usize> {
        let mut adjacent: Vec<usize> = self.children[clique].clone();
        adjacent.extend(self.parents[clique]);
        adjacent.sort_unstable();
        adjacent
    }

    /// Re-orient the tree holding `clique` so that `clique` becomes its root.
    ///
    /// Only parent/child directions and the visitation order change; the
    /// undirected edges stay exactly as discovered.
    pub fn reroot(&mut self, clique: usize) {
        let Some(&tree_index) = self.tree_of.get(clique) else {
            return;
        };
        if self.trees[tree_index].root == clique {
            return;
        }

        let nodes = self.trees[tree_index].nodes.clone();
        let neighbors: HashMap<usize, Vec<usize>> =
            nodes.iter().map(|&c| (c, self.adjacent(c))).collect();
        for &c in &nodes {
            self.parents[c] = None;
            self.children[c].clear();
        }

        let mut order = Vec::with_capacity(nodes.len());
        let mut reached: HashSet<usize> = HashSet::from([clique]);
        let mut queue = VecDeque::from([clique]);
        while let Some(parent) = queue.pop_front() {
            order.push(parent);
            for &child in neighbors.get(&parent).into_iter().flatten() {
                if reached.insert(child) {
                    self.parents[child] = Some(parent);
                    self.children[parent].push(child);
                    queue.push_back(child);
                }
            }
        }
        self.trees[tree_index] = ForestTree {
            root: clique,
            nodes: order,
        };
    }

    /// Undirected edges as `(smaller, larger)` clique pairs, sorted.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = self
            .parents
            .iter()
            .enumerate()
            .filter_map(|(child, parent)| parent.map(|p| (p.min(child), p.max(child))))
            .collect();
        edges.sort_unstable();
        edges
    }
}
