//! Canonical, ref-counted storage for references.
//!
//! References live in a slot-map arena and are addressed by [`RefId`]. A
//! separate index maps each structural key to the id holding it. Because a
//! structural edit changes the key, mutation follows a strict protocol:
//!
//! 1. [`ReferencePool::detach`] removes the entry from the index;
//! 2. [`ReferencePool::detached_mut`] hands out the reference for mutation;
//! 3. [`ReferencePool::attach`] re-indexes it under its new key, or reports a
//!    collision with an entry that already holds that key.
//!
//! Detached entries are invisible to [`ReferencePool::lookup`].

use std::collections::HashMap;

use slotmap::{SlotMap, new_key_type};

use crate::EngineError;
use crate::reference::hash::StructuralBuildHasher;
use crate::reference::{Reference, ReferenceKind};

new_key_type! {
    /// Stable handle of a pooled reference.
    pub struct RefId;
}

#[derive(Clone, Debug)]
pub struct PoolEntry {
    reference: Reference,
    count: usize,
    attached: bool,
}

impl PoolEntry {
    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Outcome of re-indexing a detached entry.
#[must_use]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Attach {
    Unique,
    /// Another entry already holds the key; the entry stays detached.
    Collided(RefId),
}

#[derive(Default, Debug)]
pub struct ReferencePool {
    entries: SlotMap<RefId, PoolEntry>,
    index: HashMap<ReferenceKind, RefId, StructuralBuildHasher>,
}

impl ReferencePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical id for `reference`, adding one holder.
    pub fn get_or_insert(&mut self, reference: Reference) -> Result<RefId, EngineError> {
        if !reference.is_valid() {
            return Err(EngineError::InvalidReference);
        }
        if let Some(&id) = self.index.get(reference.kind()) {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.count += 1;
                return Ok(id);
            }
        }
        let kind = reference.kind().clone();
        let id = self.entries.insert(PoolEntry {
            reference,
            count: 1,
            attached: true,
        });
        self.index.insert(kind, id);
        Ok(id)
    }

    /// Drops one holder. Returns the reference when the last holder is gone.
    /// Releasing an evicted id is a no-op.
    pub fn release(&mut self, id: RefId) -> Option<Reference> {
        let entry = self.entries.get_mut(id)?;
        entry.count = entry.count.saturating_sub(1);
        if entry.count > 0 {
            return None;
        }
        let entry = self.entries.remove(id)?;
        self.unindex(id, &entry);
        Some(entry.reference)
    }

    pub fn lookup(&self, candidate: &Reference) -> Option<RefId> {
        self.lookup_kind(candidate.kind())
    }

    pub fn lookup_kind(&self, kind: &ReferenceKind) -> Option<RefId> {
        self.index.get(kind).copied()
    }

    pub fn get(&self, id: RefId) -> Option<&Reference> {
        self.entries.get(id).map(|e| &e.reference)
    }

    /// Current holder count; zero for unknown ids.
    pub fn count(&self, id: RefId) -> usize {
        self.entries.get(id).map_or(0, |e| e.count)
    }

    pub fn contains(&self, id: RefId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RefId, &Reference)> {
        self.entries.iter().map(|(id, e)| (id, &e.reference))
    }

    pub fn entries(&self) -> impl Iterator<Item = (RefId, &PoolEntry)> {
        self.entries.iter()
    }

    pub fn ids(&self) -> Vec<RefId> {
        self.entries.keys().collect()
    }

    /// Removes the entry from the index ahead of a mutation.
    pub fn detach(&mut self, id: RefId) -> Result<(), EngineError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| EngineError::NotPooled(format!("{id:?}")))?;
        if entry.attached {
            entry.attached = false;
            if self.index.get(entry.reference.kind()) == Some(&id) {
                self.index.remove(entry.reference.kind());
            }
        }
        Ok(())
    }

    pub fn detached_mut(&mut self, id: RefId) -> Result<&mut Reference, EngineError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| EngineError::NotPooled(format!("{id:?}")))?;
        if entry.attached {
            return Err(EngineError::AttachedMutation);
        }
        Ok(&mut entry.reference)
    }

    /// Re-indexes a detached entry under its current key.
    pub fn attach(&mut self, id: RefId) -> Result<Attach, EngineError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| EngineError::NotPooled(format!("{id:?}")))?;
        if entry.attached {
            return Ok(Attach::Unique);
        }
        if !entry.reference.is_valid() {
            return Err(EngineError::InvalidReference);
        }
        entry.reference.compute_hash();
        if let Some(&other) = self.index.get(entry.reference.kind()) {
            return Ok(Attach::Collided(other));
        }
        entry.attached = true;
        self.index.insert(entry.reference.kind().clone(), id);
        Ok(Attach::Unique)
    }

    /// Detach followed by attach, for an entry mutated through other means.
    pub fn rehash(&mut self, id: RefId) -> Result<Attach, EngineError> {
        self.detach(id)?;
        self.attach(id)
    }

    /// Removes the entry regardless of its count and marks it invalid.
    pub fn evict(&mut self, id: RefId) -> Option<Reference> {
        let mut entry = self.entries.remove(id)?;
        self.unindex(id, &entry);
        entry.reference.invalidate();
        Some(entry.reference)
    }

    /// Folds the holders of `from` into `into` and drops `from`.
    pub fn merge(&mut self, from: RefId, into: RefId) -> Result<(), EngineError> {
        if from == into {
            return Ok(());
        }
        if !self.entries.contains_key(into) {
            return Err(EngineError::NotPooled(format!("{into:?}")));
        }
        let entry = self
            .entries
            .remove(from)
            .ok_or_else(|| EngineError::NotPooled(format!("{from:?}")))?;
        self.unindex(from, &entry);
        if let Some(target) = self.entries.get_mut(into) {
            target.count += entry.count;
        }
        Ok(())
    }

    fn unindex(&mut self, id: RefId, entry: &PoolEntry) {
        if entry.attached && self.index.get(entry.reference.kind()) == Some(&id) {
            self.index.remove(entry.reference.kind());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: u32, col: u32) -> Reference {
        Reference::cell(0, row, col).unwrap()
    }

    #[test]
    fn structurally_equal_refs_share_one_entry() {
        let mut pool = ReferencePool::new();
        let a = pool.get_or_insert(cell(3, 2)).unwrap();
        let b = pool.get_or_insert(cell(3, 2)).unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.count(a), 2);
        assert_eq!(pool.len(), 1);

        assert_eq!(pool.release(a), None);
        assert_eq!(pool.count(a), 1);
        assert_eq!(pool.release(a), Some(cell(3, 2)));
        assert!(pool.is_empty());
        assert_eq!(pool.lookup(&cell(3, 2)), None);
        assert_eq!(pool.release(a), None);
    }

    #[test]
    fn invalid_refs_are_rejected() {
        let mut pool = ReferencePool::new();
        let mut r = cell(1, 1);
        r.invalidate();
        assert_eq!(pool.get_or_insert(r), Err(EngineError::InvalidReference));
    }

    #[test]
    fn rehash_moves_the_index_key() {
        let mut pool = ReferencePool::new();
        let id = pool.get_or_insert(cell(3, 2)).unwrap();
        pool.detach(id).unwrap();
        assert_eq!(pool.lookup(&cell(3, 2)), None);
        pool.detached_mut(id)
            .unwrap()
            .on_rows_inserted(0, 1, 2, &Default::default());
        assert_eq!(pool.attach(id).unwrap(), Attach::Unique);
        assert_eq!(pool.lookup(&cell(5, 2)), Some(id));
        assert_eq!(pool.lookup(&cell(3, 2)), None);
    }

    #[test]
    fn attached_entries_refuse_mutation() {
        let mut pool = ReferencePool::new();
        let id = pool.get_or_insert(cell(1, 1)).unwrap();
        assert_eq!(
            pool.detached_mut(id).map(|_| ()),
            Err(EngineError::AttachedMutation)
        );
    }

    #[test]
    fn collisions_are_reported_and_mergeable() {
        let mut pool = ReferencePool::new();
        let a = pool.get_or_insert(cell(3, 1)).unwrap();
        let b = pool.get_or_insert(cell(5, 1)).unwrap();
        pool.get_or_insert(cell(5, 1)).unwrap();
        pool.detach(a).unwrap();
        pool.detached_mut(a)
            .unwrap()
            .on_rows_inserted(0, 3, 2, &Default::default());
        assert_eq!(pool.attach(a).unwrap(), Attach::Collided(b));
        pool.merge(a, b).unwrap();
        assert_eq!(pool.count(b), 3);
        assert!(!pool.contains(a));
        assert_eq!(pool.lookup(&cell(5, 1)), Some(b));
    }

    #[test]
    fn evict_drops_every_holder() {
        let mut pool = ReferencePool::new();
        let id = pool.get_or_insert(cell(2, 2)).unwrap();
        pool.get_or_insert(cell(2, 2)).unwrap();
        let gone = pool.evict(id).unwrap();
        assert!(!gone.is_valid());
        assert_eq!(pool.lookup(&cell(2, 2)), None);
        assert_eq!(pool.count(id), 0);
    }
}
