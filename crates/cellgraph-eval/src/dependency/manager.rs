use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use super::map::DependencyMap;
use crate::EngineError;
use crate::pool::{RefId, ReferencePool};
use crate::reference::Reference;

/// Forward and reverse dependency edges between pooled references.
///
/// `dependents` maps a dependency to the formulas reading it, `precedents` is
/// its exact inverse. Range links are derived edges `cell -> formula` for
/// every formula output cell lying inside a range some formula reads; they
/// are removed before every formula add/remove and rebuilt afterwards unless
/// maintenance is suspended.
#[derive(Debug, Default)]
pub struct DependencyManager {
    dependents: DependencyMap,
    precedents: DependencyMap,
    outputs: FxHashSet<RefId>,
    range_links: FxHashSet<(RefId, RefId)>,
    links_suspended: bool,
}

impl DependencyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `dep -> self_id` for every dependency. Fails without changing
    /// anything if an edge already exists.
    pub fn add_formula(
        &mut self,
        self_id: RefId,
        deps: &[RefId],
        pool: &ReferencePool,
    ) -> Result<(), EngineError> {
        self.remove_range_links();
        let result = self.check_new_edges(self_id, deps);
        if result.is_ok() {
            for &dep in deps {
                self.dependents.insert(dep, self_id);
                self.precedents.insert(self_id, dep);
            }
            self.outputs.insert(self_id);
        }
        self.refresh_range_links(pool);
        result
    }

    /// Removes exactly the edges [`Self::add_formula`] added.
    pub fn remove_formula(
        &mut self,
        self_id: RefId,
        deps: &[RefId],
        pool: &ReferencePool,
    ) -> Result<(), EngineError> {
        self.remove_range_links();
        let missing = deps
            .iter()
            .find(|&&dep| !self.dependents.contains_edge(dep, self_id))
            .copied();
        if let Some(tail) = missing {
            self.refresh_range_links(pool);
            return Err(EngineError::MissingEdge {
                tail,
                head: self_id,
            });
        }
        for &dep in deps {
            self.dependents.remove(dep, self_id);
            self.precedents.remove(self_id, dep);
        }
        self.outputs.remove(&self_id);
        self.refresh_range_links(pool);
        Ok(())
    }

    fn check_new_edges(&self, self_id: RefId, deps: &[RefId]) -> Result<(), EngineError> {
        if self.outputs.contains(&self_id) {
            return Err(EngineError::InvalidState(format!(
                "{self_id:?} already has a formula"
            )));
        }
        let mut seen = FxHashSet::default();
        for &dep in deps {
            if !seen.insert(dep) || self.dependents.contains_edge(dep, self_id) {
                return Err(EngineError::DuplicateEdge {
                    tail: dep,
                    head: self_id,
                });
            }
        }
        Ok(())
    }

    /// Stops range-link maintenance and drops existing links. Returns whether
    /// it was already suspended.
    pub fn suspend_range_links(&mut self) -> bool {
        let was = self.links_suspended;
        self.remove_range_links();
        self.links_suspended = true;
        was
    }

    pub fn resume_range_links(&mut self, pool: &ReferencePool) {
        self.links_suspended = false;
        self.refresh_range_links(pool);
    }

    pub fn range_links_suspended(&self) -> bool {
        self.links_suspended
    }

    pub fn range_link_count(&self) -> usize {
        self.range_links.len()
    }

    fn remove_range_links(&mut self) {
        for (tail, head) in self.range_links.drain() {
            self.dependents.remove(tail, head);
            self.precedents.remove(head, tail);
        }
    }

    fn refresh_range_links(&mut self, pool: &ReferencePool) {
        if self.links_suspended {
            return;
        }
        self.remove_range_links();

        let mut ranges: Vec<RefId> = self
            .dependents
            .tails()
            .filter(|&t| pool.get(t).is_some_and(Reference::can_range_link))
            .collect();
        ranges.sort_unstable();
        let mut cells: Vec<RefId> = self
            .outputs
            .iter()
            .copied()
            .filter(|&o| pool.get(o).is_some_and(|r| !r.can_range_link()))
            .collect();
        cells.sort_unstable();

        for &range_id in &ranges {
            let Some(range) = pool.get(range_id) else {
                continue;
            };
            let heads = self.dependents.heads(range_id).to_vec();
            for &cell_id in &cells {
                if !pool.get(cell_id).is_some_and(|c| c.intersects(range)) {
                    continue;
                }
                for &head in &heads {
                    if self.dependents.insert(cell_id, head) {
                        self.precedents.insert(head, cell_id);
                        self.range_links.insert((cell_id, head));
                    }
                }
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            ranges = ranges.len(),
            links = self.range_links.len(),
            "range links rebuilt"
        );
    }

    /// True if following dependents from `id` reaches a reference that is
    /// circular-equal to it.
    pub fn is_circular(&self, id: RefId, pool: &ReferencePool) -> bool {
        let Some(start) = pool.get(id) else {
            return false;
        };
        let mut visited = FxHashSet::default();
        let mut stack: Vec<RefId> = self.dependents.heads(id).to_vec();
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            if node == id || pool.get(node).is_some_and(|r| r.circular_equals(start)) {
                return true;
            }
            stack.extend_from_slice(self.dependents.heads(node));
        }
        false
    }

    /// Ordered list of references to recalculate after `roots` changed.
    ///
    /// Circular roots are dropped, the volatile marker joins the roots when a
    /// formula reads it, and the reachable subgraph is sorted with Kahn's
    /// algorithm on a private copy. Roots that seed the sort are not returned.
    pub fn calculation_list(&self, roots: &[RefId], pool: &ReferencePool) -> Vec<RefId> {
        let mut seen = FxHashSet::default();
        let mut roots: Vec<RefId> = roots
            .iter()
            .copied()
            .filter(|&r| seen.insert(r) && !self.is_circular(r, pool))
            .collect();
        if let Some(marker) = pool.lookup(&Reference::volatile()) {
            if self.dependents.contains_tail(marker)
                && !seen.contains(&marker)
                && !self.is_circular(marker, pool)
            {
                roots.push(marker);
            }
        }

        let (mut sub_dependents, mut sub_precedents) = self.reachable_subgraph(&roots);

        let seeds: Vec<RefId> = roots
            .into_iter()
            .filter(|&r| !sub_precedents.contains_tail(r))
            .collect();

        let mut order = Vec::new();
        let mut queue: VecDeque<RefId> = seeds.iter().copied().collect();
        while let Some(node) = queue.pop_front() {
            order.push(node);
            for head in sub_dependents.remove_tail(node) {
                sub_precedents.remove(head, node);
                if !sub_precedents.contains_tail(head) {
                    queue.push_back(head);
                }
            }
        }

        let seeds: FxHashSet<RefId> = seeds.into_iter().collect();
        order.retain(|id| !seeds.contains(id));
        order
    }

    fn reachable_subgraph(&self, roots: &[RefId]) -> (DependencyMap, DependencyMap) {
        let mut dependents = DependencyMap::new();
        let mut precedents = DependencyMap::new();
        let mut visited: FxHashSet<RefId> = roots.iter().copied().collect();
        let mut queue: VecDeque<RefId> = roots.iter().copied().collect();
        while let Some(node) = queue.pop_front() {
            for &head in self.dependents.heads(node) {
                dependents.insert(node, head);
                precedents.insert(head, node);
                if visited.insert(head) {
                    queue.push_back(head);
                }
            }
        }
        (dependents, precedents)
    }

    /// Calculation list seeded by every pooled reference intersecting `root`.
    pub fn reference_calculation_list(&self, root: &Reference, pool: &ReferencePool) -> Vec<RefId> {
        let mut roots: Vec<RefId> = pool
            .iter()
            .filter(|(_, r)| r.intersects(root))
            .map(|(id, _)| id)
            .collect();
        roots.sort_unstable();
        self.calculation_list(&roots, pool)
    }

    /// Calculation list seeded by every pooled reference without precedents.
    pub fn all_calculation_list(&self, pool: &ReferencePool) -> Vec<RefId> {
        let mut roots: Vec<RefId> = pool
            .iter()
            .map(|(id, _)| id)
            .filter(|&id| !self.precedents.contains_tail(id))
            .collect();
        roots.sort_unstable();
        self.calculation_list(&roots, pool)
    }

    /// Number of direct precedents, range links excluded.
    pub fn direct_precedents_count(&self, id: RefId) -> usize {
        self.precedents
            .heads(id)
            .iter()
            .filter(|&&t| !self.range_links.contains(&(t, id)))
            .count()
    }

    /// Number of direct dependents, range links excluded.
    pub fn direct_dependents_count(&self, id: RefId) -> usize {
        self.dependents
            .heads(id)
            .iter()
            .filter(|&&h| !self.range_links.contains(&(id, h)))
            .count()
    }

    pub fn dependents_of(&self, id: RefId) -> &[RefId] {
        self.dependents.heads(id)
    }

    pub fn precedents_of(&self, id: RefId) -> &[RefId] {
        self.precedents.heads(id)
    }

    pub fn is_formula_output(&self, id: RefId) -> bool {
        self.outputs.contains(&id)
    }

    pub fn contains_edge(&self, tail: RefId, head: RefId) -> bool {
        self.dependents.contains_edge(tail, head)
    }

    /// Drops every edge touching `id`, in both maps.
    pub fn remove_reference(&mut self, id: RefId) {
        for head in self.dependents.remove_tail(id) {
            self.precedents.remove(head, id);
        }
        for tail in self.precedents.remove_tail(id) {
            self.dependents.remove(tail, id);
        }
        self.outputs.remove(&id);
        self.range_links.retain(|&(t, h)| t != id && h != id);
    }

    /// Redirects every edge of `from` onto `into`.
    pub fn merge(&mut self, from: RefId, into: RefId) {
        if from == into {
            return;
        }
        let remap = |id: RefId| if id == from { into } else { id };
        let out_edges = self.dependents.remove_tail(from);
        for &head in &out_edges {
            self.precedents.remove(head, from);
        }
        let in_edges = self.precedents.remove_tail(from);
        for &tail in &in_edges {
            self.dependents.remove(tail, from);
        }
        for head in out_edges {
            let head = remap(head);
            if self.dependents.insert(into, head) {
                self.precedents.insert(head, into);
            }
        }
        for tail in in_edges {
            let tail = remap(tail);
            if self.dependents.insert(tail, into) {
                self.precedents.insert(into, tail);
            }
        }
        if self.outputs.remove(&from) {
            self.outputs.insert(into);
        }
        self.range_links = self
            .range_links
            .drain()
            .map(|(t, h)| (remap(t), remap(h)))
            .collect();
    }

    /// Edges that came from formulas, range links excluded.
    pub fn formula_edges(&self) -> impl Iterator<Item = (RefId, RefId)> + '_ {
        self.dependents
            .iter()
            .filter(|edge| !self.range_links.contains(edge))
    }

    /// `tail -> [heads]` per line, sorted by tail text.
    pub fn dump(&self, name: impl Fn(RefId) -> String) -> String {
        let mut lines: Vec<String> = self
            .dependents
            .tails()
            .map(|tail| {
                let heads: Vec<String> = self.dependents.heads(tail).iter().map(|&h| name(h)).collect();
                format!("{} -> [{}]", name(tail), heads.join(", "))
            })
            .collect();
        lines.sort();
        lines.join("\n")
    }

    /// Checks that the two maps are exact inverses.
    pub fn is_consistent(&self) -> bool {
        self.dependents.edge_count() == self.precedents.edge_count()
            && self
                .dependents
                .iter()
                .all(|(t, h)| self.precedents.contains_edge(h, t))
    }
}
