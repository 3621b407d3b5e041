use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::pool::RefId;

pub type Heads = SmallVec<[RefId; 4]>;

/// `tail -> ordered set of heads`. Heads keep insertion order and a tail with
/// no heads has no entry.
#[derive(Clone, Debug, Default)]
pub struct DependencyMap {
    edges: FxHashMap<RefId, Heads>,
}

impl DependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_edge(&self, tail: RefId, head: RefId) -> bool {
        self.edges.get(&tail).is_some_and(|h| h.contains(&head))
    }

    pub fn contains_tail(&self, tail: RefId) -> bool {
        self.edges.contains_key(&tail)
    }

    pub fn heads(&self, tail: RefId) -> &[RefId] {
        self.edges.get(&tail).map_or(&[][..], |h| h.as_slice())
    }

    pub fn head_count(&self, tail: RefId) -> usize {
        self.edges.get(&tail).map_or(0, |h| h.len())
    }

    /// Returns false if the edge was already present.
    pub fn insert(&mut self, tail: RefId, head: RefId) -> bool {
        let heads = self.edges.entry(tail).or_default();
        if heads.contains(&head) {
            return false;
        }
        heads.push(head);
        true
    }

    /// Returns false if the edge was absent.
    pub fn remove(&mut self, tail: RefId, head: RefId) -> bool {
        let Some(heads) = self.edges.get_mut(&tail) else {
            return false;
        };
        let Some(pos) = heads.iter().position(|&h| h == head) else {
            return false;
        };
        heads.remove(pos);
        if heads.is_empty() {
            self.edges.remove(&tail);
        }
        true
    }

    /// Drops every edge leaving `tail`, returning its heads.
    pub fn remove_tail(&mut self, tail: RefId) -> Heads {
        self.edges.remove(&tail).unwrap_or_default()
    }

    pub fn tails(&self) -> impl Iterator<Item = RefId> + '_ {
        self.edges.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RefId, RefId)> + '_ {
        self.edges
            .iter()
            .flat_map(|(&t, heads)| heads.iter().map(move |&h| (t, h)))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|h| h.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
