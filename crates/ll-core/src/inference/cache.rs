//! Factor and message caches for repeated inference on one model.
//!
//! Both caches are scoped to a single [`ModelId`] and reset when a
//! [`crate::inference::CliqueTree`] is handed a different model instance.
//!
//! The factor cache keeps the last table built for each [`FactorId`] together
//! with the observations it was clamped against. Each rebuild gets a new
//! version number, which is how the message cache tells which cliques
//! changed since the previous call.
//!
//! The message cache keeps every message from the previous call of each
//! [`MarginalizationMode`]. It is only consulted when the clique set is the
//! same and at most one clique's version moved; anything else recomputes.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use ll_common::{FactorId, ModelId, Result};
use serde::Serialize;
use tracing::{debug, trace};

use super::table_factor::{MarginalizationMode, TableFactor};

/// Hit and miss counters, cumulative over the life of a clique tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub factor_hits: u64,
    pub factor_misses: u64,
    pub message_hits: u64,
    pub message_misses: u64,
}

#[derive(Debug, Clone)]
struct CachedFactor {
    observations: Vec<Option<usize>>,
    table: Arc<TableFactor>,
    version: u64,
}

/// Built clique tables by factor id.
#[derive(Debug, Default)]
pub struct FactorCache {
    model: Option<ModelId>,
    entries: HashMap<FactorId, CachedFactor>,
    next_version: u64,
}

impl FactorCache {
    /// Drop every entry if `model` is not the model the entries came from.
    pub fn scope_to(&mut self, model: ModelId) {
        if self.model != Some(model) {
            if self.model.is_some() {
                debug!(%model, dropped = self.entries.len(), "factor cache reset for new model");
            }
            self.entries.clear();
            self.model = Some(model);
        }
    }

    /// A version number no table has carried before.
    pub fn fresh_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    /// Cached table for `id` if it was built against `observations`,
    /// otherwise build, store, and return a new one.
    pub fn get_or_build(
        &mut self,
        id: FactorId,
        observations: &[Option<usize>],
        stats: &mut CacheStats,
        build: impl FnOnce() -> Result<TableFactor>,
    ) -> Result<(Arc<TableFactor>, u64)> {
        if let Some(entry) = self.entries.get(&id) {
            if entry.observations == observations {
                stats.factor_hits += 1;
                trace!(factor = %id, version = entry.version, "factor cache hit");
                return Ok((Arc::clone(&entry.table), entry.version));
            }
        }
        stats.factor_misses += 1;
        let table = Arc::new(build()?);
        let version = self.fresh_version();
        trace!(factor = %id, version, "factor cache miss");
        self.entries.insert(
            id,
            CachedFactor {
                observations: observations.to_vec(),
                table: Arc::clone(&table),
                version,
            },
        );
        Ok((table, version))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Messages of one completed call.
#[derive(Debug, Clone)]
struct MessageRecord {
    cliques: Vec<(FactorId, u64)>,
    edges: BTreeSet<(FactorId, FactorId)>,
    messages: HashMap<(FactorId, FactorId), TableFactor>,
}

/// What the previous call's messages allow this call to skip.
#[derive(Debug)]
pub struct ReusePlan {
    /// Position of the one clique whose table changed, if any. Propagation
    /// re-roots its tree there.
    pub changed: Option<usize>,
    edges: BTreeSet<(FactorId, FactorId)>,
    messages: HashMap<(FactorId, FactorId), TableFactor>,
}

impl ReusePlan {
    /// Whether the new forest has the same undirected edges as the old one.
    pub fn matches_edges(&self, edges: &BTreeSet<(FactorId, FactorId)>) -> bool {
        self.edges == *edges
    }

    /// Take the previous message from `from` to `to`, if one was recorded.
    pub fn take(&mut self, from: FactorId, to: FactorId) -> Option<TableFactor> {
        self.messages.remove(&(from, to))
    }
}

/// Previous-call messages, kept separately per mode.
#[derive(Debug, Default)]
pub struct MessageCache {
    model: Option<ModelId>,
    sum: Option<MessageRecord>,
    max: Option<MessageRecord>,
}

impl MessageCache {
    pub fn scope_to(&mut self, model: ModelId) {
        if self.model != Some(model) {
            self.clear();
            self.model = Some(model);
        }
    }

    fn slot(&mut self, mode: MarginalizationMode) -> &mut Option<MessageRecord> {
        match mode {
            MarginalizationMode::Sum => &mut self.sum,
            MarginalizationMode::Max => &mut self.max,
        }
    }

    /// Decide whether the previous call's messages can seed this one.
    ///
    /// `cliques` lists this call's cliques in position order. Consumes the
    /// stored record either way.
    pub fn plan(&mut self, mode: MarginalizationMode, cliques: &[(FactorId, u64)]) -> Option<ReusePlan> {
        let record = self.slot(mode).take()?;
        if record.cliques.len() != cliques.len()
            || record
                .cliques
                .iter()
                .zip(cliques)
                .any(|(old, new)| old.0 != new.0)
        {
            debug!(%mode, "message cache miss: clique set changed");
            return None;
        }
        let changed: Vec<usize> = record
            .cliques
            .iter()
            .zip(cliques)
            .enumerate()
            .filter(|(_, (old, new))| old.1 != new.1)
            .map(|(pos, _)| pos)
            .collect();
        if changed.len() > 1 {
            debug!(%mode, changed = changed.len(), "message cache miss: several cliques changed");
            return None;
        }
        debug!(%mode, changed = ?changed.first(), "message cache usable");
        Some(ReusePlan {
            changed: changed.first().copied(),
            edges: record.edges,
            messages: record.messages,
        })
    }

    /// Remember this call's messages for the next call of the same mode.
    pub fn record(
        &mut self,
        mode: MarginalizationMode,
        cliques: Vec<(FactorId, u64)>,
        edges: BTreeSet<(FactorId, FactorId)>,
        messages: HashMap<(FactorId, FactorId), TableFactor>,
    ) {
        *self.slot(mode) = Some(MessageRecord {
            cliques,
            edges,
            messages,
        });
    }

    /// Forget the previous call of `mode`.
    pub fn invalidate(&mut self, mode: MarginalizationMode) {
        *self.slot(mode) = None;
    }

    pub fn clear(&mut self) {
        self.sum = None;
        self.max = None;
    }
}
