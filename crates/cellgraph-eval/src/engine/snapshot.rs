//! Point-in-time copy of the pool and graph, keyed by structural reference
//! keys so it can be compared across engines or serialized (feature `serde`).

use crate::pool::RefId;
use crate::reference::ReferenceKind;
use crate::sheet::Workbook;

use super::formula_engine::FormulaEngine;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshotEntry {
    pub reference: ReferenceKind,
    pub count: usize,
    /// One-at-a-time structural hash; identical on every platform.
    pub hash: u32,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSnapshot {
    pub pool: Vec<PoolSnapshotEntry>,
    /// `(dependency, formula)` pairs. Range links are derived and omitted.
    pub dependents: Vec<(ReferenceKind, ReferenceKind)>,
    /// `(formula, dependency)` pairs, the inverse of `dependents`.
    pub precedents: Vec<(ReferenceKind, ReferenceKind)>,
    /// Self references with a bound formula.
    pub formulas: Vec<ReferenceKind>,
}

impl<W: Workbook> FormulaEngine<W> {
    /// Entries, edges and formulas are ordered by A1 text, so engines with
    /// the same structure compare equal however their slots were reused.
    pub fn snapshot(&self) -> GraphSnapshot {
        let kind = |id: RefId| self.pool.get(id).map(|r| r.kind().clone());
        let text = |id: RefId| self.pool.get(id).map(|r| self.a1(r)).unwrap_or_default();

        let mut entries: Vec<(String, PoolSnapshotEntry)> = self
            .pool
            .entries()
            .map(|(_, e)| {
                (
                    self.a1(e.reference()),
                    PoolSnapshotEntry {
                        reference: e.reference().kind().clone(),
                        count: e.count(),
                        hash: e.reference().structural_hash(),
                    },
                )
            })
            .collect();
        entries.sort_by(|(a, x), (b, y)| a.cmp(b).then(x.hash.cmp(&y.hash)));

        let mut edges: Vec<(RefId, RefId)> = self.dependencies.formula_edges().collect();
        edges.sort_by_cached_key(|&(t, h)| (text(t), text(h)));
        let dependents: Vec<(ReferenceKind, ReferenceKind)> = edges
            .iter()
            .filter_map(|&(t, h)| Some((kind(t)?, kind(h)?)))
            .collect();
        let mut precedents: Vec<(ReferenceKind, ReferenceKind)> = Vec::with_capacity(edges.len());
        edges.sort_by_cached_key(|&(t, h)| (text(h), text(t)));
        precedents.extend(edges.iter().filter_map(|&(t, h)| Some((kind(h)?, kind(t)?))));

        let mut formulas: Vec<RefId> = self.formulas.keys().copied().collect();
        formulas.sort_by_cached_key(|&id| text(id));

        GraphSnapshot {
            pool: entries.into_iter().map(|(_, e)| e).collect(),
            dependents,
            precedents,
            formulas: formulas.into_iter().filter_map(kind).collect(),
        }
    }
}
