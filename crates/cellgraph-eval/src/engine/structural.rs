//! Structural edits: keep pooled references, dependency edges and bound
//! formulas correct when the grid changes shape.
//!
//! The engine only observes edits. Apply the same change to sheet storage
//! first (for example with the helpers on
//! [`crate::test_workbook::MemoryWorkbook`]), then notify the engine, so that
//! `#REF!` writes and recalculation land on the post-edit grid.

use cellgraph_common::{ExcelError, SheetId};
use rustc_hash::FxHashSet;

use super::formula_engine::FormulaEngine;
use crate::EngineError;
use crate::pool::{Attach, RefId};
use crate::reference::{Area, EditOutcome, GridEdit, Reference, ReferenceKind};
use crate::sheet::Workbook;

/// What a structural edit did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftSummary {
    /// Pooled references whose coordinates changed.
    pub references_adjusted: usize,
    /// Pooled references invalidated and evicted.
    pub references_invalidated: usize,
    /// Formulas whose own cell was destroyed, at their pre-edit location.
    pub formulas_removed: Vec<Reference>,
    /// Formulas removed because something they read was destroyed, at their
    /// post-edit location.
    pub formulas_invalidated: Vec<Reference>,
    /// Formulas re-evaluated afterwards, in evaluation order.
    pub recalculated: Vec<Reference>,
}

impl<W: Workbook> FormulaEngine<W> {
    pub fn rows_inserted(&mut self, sheet: SheetId, at: u32, count: u32) -> Result<ShiftSummary, EngineError> {
        self.config.bounds.check_row(at)?;
        self.apply_grid_edit(GridEdit::RowsInserted { sheet, at, count })
    }

    pub fn rows_removed(&mut self, sheet: SheetId, at: u32, count: u32) -> Result<ShiftSummary, EngineError> {
        self.config.bounds.check_row(at)?;
        self.apply_grid_edit(GridEdit::RowsRemoved { sheet, at, count })
    }

    pub fn columns_inserted(
        &mut self,
        sheet: SheetId,
        at: u32,
        count: u32,
    ) -> Result<ShiftSummary, EngineError> {
        self.config.bounds.check_column(at)?;
        self.apply_grid_edit(GridEdit::ColumnsInserted { sheet, at, count })
    }

    pub fn columns_removed(
        &mut self,
        sheet: SheetId,
        at: u32,
        count: u32,
    ) -> Result<ShiftSummary, EngineError> {
        self.config.bounds.check_column(at)?;
        self.apply_grid_edit(GridEdit::ColumnsRemoved { sheet, at, count })
    }

    /// `range` was cut and pasted `row_offset` rows down and `col_offset`
    /// columns right on the same sheet.
    pub fn range_moved(
        &mut self,
        range: &Reference,
        row_offset: i64,
        col_offset: i64,
    ) -> Result<ShiftSummary, EngineError> {
        let sheet = range
            .sheet()
            .ok_or_else(|| EngineError::InvalidArgument(format!("{} is not on a sheet", self.a1(range))))?;
        self.range_moved_to(range, sheet, row_offset, col_offset)
    }

    /// Like [`Self::range_moved`], landing on `dest_sheet`.
    pub fn range_moved_to(
        &mut self,
        range: &Reference,
        dest_sheet: SheetId,
        row_offset: i64,
        col_offset: i64,
    ) -> Result<ShiftSummary, EngineError> {
        if !range.is_valid() {
            return Err(EngineError::InvalidReference);
        }
        let source = range
            .area()
            .ok_or_else(|| EngineError::InvalidArgument(format!("{} is not on a sheet", self.a1(range))))?;
        if self.workbook.sheet(dest_sheet).is_none() {
            return Err(EngineError::UnknownSheet(dest_sheet));
        }
        // bands span the whole axis they are unbounded on, whatever the bounds
        let bounds = self.config.bounds;
        let rows_fit = |d: &Area| {
            source.is_full_height()
                || (bounds.check_row(d.top).is_ok() && bounds.check_row(d.bottom).is_ok())
        };
        let columns_fit = |d: &Area| {
            source.is_full_width()
                || (bounds.check_column(d.left).is_ok() && bounds.check_column(d.right).is_ok())
        };
        let dest = source
            .offset(dest_sheet, row_offset, col_offset)
            .filter(|d| rows_fit(d) && columns_fit(d))
            .ok_or_else(|| EngineError::InvalidArgument("move leaves the grid".to_string()))?;
        if dest == source {
            return Ok(ShiftSummary::default());
        }
        self.apply_grid_edit(GridEdit::RangeMoved { source, dest })
    }

    /// Invalidates every reference on `sheet`.
    pub fn sheet_removed(&mut self, sheet: SheetId) -> Result<ShiftSummary, EngineError> {
        self.apply_grid_edit(GridEdit::SheetRemoved { sheet })
    }

    /// Runs every pooled reference the edit touches through it, then evicts,
    /// unbinds, rehashes and recalculates as needed.
    pub fn apply_grid_edit(&mut self, edit: GridEdit) -> Result<ShiftSummary, EngineError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("grid_edit", edit = ?edit).entered();

        let mut summary = ShiftSummary::default();
        let bounds = self.config.bounds;

        let mut invalidated: Vec<RefId> = Vec::new();
        let mut moved: Vec<(RefId, Reference)> = Vec::new();
        let mut touched: Vec<RefId> = Vec::new();
        for (id, r) in self.pool.iter() {
            if !edit.touches(r) {
                continue;
            }
            let mut next = r.clone();
            match next.apply_edit(&edit, &bounds) {
                EditOutcome::NotAffected => {}
                EditOutcome::Invalidated => invalidated.push(id),
                EditOutcome::Affected => {
                    touched.push(id);
                    if next.kind() != r.kind() {
                        moved.push((id, next));
                    }
                }
            }
        }
        invalidated.sort_unstable();
        moved.sort_unstable_by_key(|(id, _)| *id);
        touched.sort_unstable();

        let mut merged = Vec::new();
        if !invalidated.is_empty() || !moved.is_empty() {
            let was_suspended = self.dependencies.suspend_range_links();
            let result = self.rewrite_after_edit(&invalidated, &moved, &mut summary);
            if !was_suspended {
                self.dependencies.resume_range_links(&self.pool);
            }
            merged = result?;
        }

        if !summary.formulas_invalidated.is_empty() || !summary.formulas_removed.is_empty() {
            let mut references = summary.formulas_removed.clone();
            references.extend(summary.formulas_invalidated.iter().cloned());
            self.emit(super::EngineEvent::FormulasInvalidated { references });
        }

        if self.config.recalculate_on_edit {
            for id in touched.iter_mut() {
                while let Some(&(_, into)) = merged.iter().find(|(from, _)| *from == *id) {
                    *id = into;
                }
            }
            let roots = self.recalculation_roots(&edit, &touched, &summary);
            summary.recalculated = self.recalculate_ids(&roots);
        }
        self.refresh_circular();
        Ok(summary)
    }

    fn rewrite_after_edit(
        &mut self,
        invalidated: &[RefId],
        moved: &[(RefId, Reference)],
        summary: &mut ShiftSummary,
    ) -> Result<Vec<(RefId, RefId)>, EngineError> {
        let dead: FxHashSet<RefId> = invalidated.iter().copied().collect();
        let post_edit = |id: RefId, pool: &crate::pool::ReferencePool| -> Option<Reference> {
            moved
                .iter()
                .find(|(m, _)| *m == id)
                .map(|(_, r)| r.clone())
                .or_else(|| pool.get(id).cloned())
        };

        // Formulas whose own cell is gone, then formulas reading something gone.
        let mut dropped: Vec<RefId> = self
            .formulas
            .keys()
            .copied()
            .filter(|id| dead.contains(id))
            .collect();
        dropped.sort_unstable();
        let mut broken: Vec<RefId> = self
            .formulas
            .iter()
            .filter(|(id, b)| !dead.contains(*id) && b.deps.iter().any(|d| dead.contains(d)))
            .map(|(id, _)| *id)
            .collect();
        broken.sort_unstable();

        for id in dropped {
            if let Some(r) = self.pool.get(id).cloned() {
                summary.formulas_removed.push(r);
            }
            self.unbind(id)?;
        }
        let mut broken_at = Vec::with_capacity(broken.len());
        for id in broken {
            if let Some(r) = post_edit(id, &self.pool) {
                broken_at.push(r);
            }
            self.unbind(id)?;
        }

        for &id in invalidated {
            if self.pool.contains(id) {
                self.dependencies.remove_reference(id);
                self.pool.evict(id);
                #[cfg(feature = "tracing")]
                tracing::debug!(?id, "evicted reference with outstanding holders");
            }
        }
        summary.references_invalidated = invalidated.len();

        // detach everything first so shifted keys never collide with stale ones
        let live: Vec<&(RefId, Reference)> = moved.iter().filter(|(id, _)| self.pool.contains(*id)).collect();
        for (id, _) in &live {
            self.pool.detach(*id)?;
        }
        for (id, next) in &live {
            *self.pool.detached_mut(*id)? = next.clone();
        }
        let mut merged = Vec::new();
        for (id, _) in &live {
            match self.pool.attach(*id)? {
                Attach::Unique => {}
                Attach::Collided(into) => {
                    self.merge_references(*id, into)?;
                    merged.push((*id, into));
                }
            }
        }
        summary.references_adjusted = live.len();

        for at in &broken_at {
            if self.config.write_ref_errors || !matches!(at.kind(), ReferenceKind::Cell(_)) {
                self.write_value(at, ExcelError::invalid_reference().into());
            }
        }
        summary.formulas_invalidated = broken_at;
        Ok(merged)
    }

    /// Folds pooled reference `from` into `into` after an edit gave them the
    /// same key.
    fn merge_references(&mut self, from: RefId, into: RefId) -> Result<(), EngineError> {
        if self.formulas.contains_key(&from) && self.formulas.contains_key(&into) {
            return Err(EngineError::InvalidState(format!(
                "two formulas would share {}",
                self.pool.get(into).map(|r| self.a1(r)).unwrap_or_default()
            )));
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(?from, ?into, "merging colliding references");
        if let Some(bound) = self.formulas.remove(&from) {
            self.formulas.insert(into, bound);
        }
        for bound in self.formulas.values_mut() {
            for d in bound.deps.iter_mut().filter(|d| **d == from) {
                *d = into;
            }
        }
        if self.circular.remove(&from) {
            self.circular.insert(into);
        }
        self.dependencies.merge(from, into);
        self.pool.merge(from, into)
    }

    fn recalculation_roots(&self, edit: &GridEdit, touched: &[RefId], summary: &ShiftSummary) -> Vec<RefId> {
        let mut areas: Vec<Area> = summary
            .formulas_invalidated
            .iter()
            .filter_map(Reference::area)
            .collect();
        if let GridEdit::RangeMoved { source, dest } = edit {
            areas.push(*source);
            areas.push(*dest);
        }
        let mut roots: Vec<RefId> = touched
            .iter()
            .copied()
            .filter(|&id| self.pool.contains(id))
            .collect();
        roots.extend(self.pool.iter().filter_map(|(id, r)| {
            let area = r.area()?;
            areas.iter().any(|a| a.intersects(&area)).then_some(id)
        }));
        roots.sort_unstable();
        roots.dedup();
        roots
    }
}
