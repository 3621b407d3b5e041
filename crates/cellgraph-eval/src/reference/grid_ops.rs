//! Structural grid edits applied to a single reference.
//!
//! Every operation mutates the reference in place and recomputes its
//! structural hash before returning. A pooled reference must be detached from
//! the pool index before any of these run (see [`crate::pool::ReferencePool::detach`]).

use cellgraph_common::{GridBounds, SheetId};

use super::{Area, CellRangeRef, Edge, Reference, ReferenceKind};

/// Result of running a reference through one edit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EditOutcome {
    NotAffected,
    /// Coordinates changed, or the cells it denotes were overwritten.
    Affected,
    /// The reference no longer denotes a location. Permanent.
    Invalidated,
}

/// A structural change to the grid.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GridEdit {
    RowsInserted { sheet: SheetId, at: u32, count: u32 },
    RowsRemoved { sheet: SheetId, at: u32, count: u32 },
    ColumnsInserted { sheet: SheetId, at: u32, count: u32 },
    ColumnsRemoved { sheet: SheetId, at: u32, count: u32 },
    /// `dest` has the same size as `source`.
    RangeMoved { source: Area, dest: Area },
    SheetRemoved { sheet: SheetId },
}

impl GridEdit {
    /// Whether `reference` can be affected at all; used to pre-select pooled refs.
    pub fn touches(&self, reference: &Reference) -> bool {
        let Some(sheet) = reference.sheet() else {
            return false;
        };
        match *self {
            GridEdit::RowsInserted { sheet: s, .. }
            | GridEdit::RowsRemoved { sheet: s, .. }
            | GridEdit::ColumnsInserted { sheet: s, .. }
            | GridEdit::ColumnsRemoved { sheet: s, .. }
            | GridEdit::SheetRemoved { sheet: s } => s == sheet,
            GridEdit::RangeMoved { source, dest } => source.sheet == sheet || dest.sheet == sheet,
        }
    }
}

/// How a `[start, finish]` span fares under an edit on its axis.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SpanEdit {
    Unchanged,
    Moved(u32, u32),
    Gone,
}

fn insert_span(start: u32, finish: u32, at: u32, count: u32, max: u32) -> SpanEdit {
    if count == 0 || finish < at {
        return SpanEdit::Unchanged;
    }
    let shift = |v: u32| if v >= at { v as u64 + count as u64 } else { v as u64 };
    let (s, f) = (shift(start), shift(finish));
    if s > max as u64 {
        return SpanEdit::Gone;
    }
    SpanEdit::Moved(s as u32, f.min(max as u64) as u32)
}

fn remove_span(start: u32, finish: u32, at: u32, count: u32) -> SpanEdit {
    if count == 0 || finish < at {
        return SpanEdit::Unchanged;
    }
    let end = at.saturating_add(count - 1);
    if start > end {
        return SpanEdit::Moved(start - count, finish - count);
    }
    if start >= at && finish <= end {
        return SpanEdit::Gone;
    }
    let new_start = if start >= at { at } else { start };
    let new_finish = if finish > end { finish - count } else { at - 1 };
    SpanEdit::Moved(new_start, new_finish)
}

#[derive(Clone, Copy)]
enum Axis {
    Rows,
    Columns,
}

impl Reference {
    pub fn on_rows_inserted(
        &mut self,
        sheet: SheetId,
        at: u32,
        count: u32,
        bounds: &GridBounds,
    ) -> EditOutcome {
        self.shift_axis(Axis::Rows, sheet, |s, f| {
            insert_span(s, f, at, count, bounds.max_row)
        })
    }

    pub fn on_rows_removed(&mut self, sheet: SheetId, at: u32, count: u32) -> EditOutcome {
        self.shift_axis(Axis::Rows, sheet, |s, f| remove_span(s, f, at, count))
    }

    pub fn on_columns_inserted(
        &mut self,
        sheet: SheetId,
        at: u32,
        count: u32,
        bounds: &GridBounds,
    ) -> EditOutcome {
        self.shift_axis(Axis::Columns, sheet, |s, f| {
            insert_span(s, f, at, count, bounds.max_column)
        })
    }

    pub fn on_columns_removed(&mut self, sheet: SheetId, at: u32, count: u32) -> EditOutcome {
        self.shift_axis(Axis::Columns, sheet, |s, f| remove_span(s, f, at, count))
    }

    pub fn on_sheet_removed(&mut self, sheet: SheetId) -> EditOutcome {
        if self.is_valid() && self.sheet() == Some(sheet) {
            self.invalidate();
            EditOutcome::Invalidated
        } else {
            EditOutcome::NotAffected
        }
    }

    /// Applies the move ladder. The first matching case decides the outcome.
    pub fn on_range_moved(&mut self, source: &Area, dest: &Area) -> EditOutcome {
        if !self.is_valid() {
            return EditOutcome::NotAffected;
        }
        let Some(r) = self.area() else {
            return EditOutcome::NotAffected;
        };
        let same_sheet = source.sheet == dest.sheet;
        if same_sheet && source == dest {
            return EditOutcome::NotAffected;
        }
        let dr = dest.top as i64 - source.top as i64;
        let dc = dest.left as i64 - source.left as i64;

        // 1. edge pulled to another sheet
        if !same_sheet && r.sheet == source.sheet && !source.contains(&r) {
            if let Some(edge) = r.covered_edge(source) {
                return self.resize(r.shave(edge, source));
            }
        }
        // 2. edge pulled in from another sheet
        if !same_sheet && r.sheet == dest.sheet && !dest.contains(&r) {
            if let Some(edge) = r.covered_edge(dest) {
                return self.resize(r.shave(edge, dest));
            }
        }
        if same_sheet && r.sheet == source.sheet {
            // 3 and 4. an edge slab slides along its own axis
            if let Some(edge) = source.slab_edge_of(&r) {
                let along_axis = if edge.is_horizontal() {
                    dc == 0 && dr != 0
                } else {
                    dr == 0 && dc != 0
                };
                if along_axis {
                    let outward = match edge {
                        Edge::Top => dr < 0,
                        Edge::Bottom => dr > 0,
                        Edge::Left => dc < 0,
                        Edge::Right => dc > 0,
                    };
                    if outward {
                        return self.resize(Some(r.hull(dest)));
                    }
                    let remainder = r.shave(edge, source);
                    let moved_in = dest.intersection(&r);
                    return self.resize(match (remainder, moved_in) {
                        (Some(rem), Some(inside)) => Some(rem.hull(&inside)),
                        (rem, inside) => rem.or(inside),
                    });
                }
            }
            // 5. destination lands on an edge
            if !source.contains(&r) && !dest.contains(&r) {
                if let Some(edge) = r.covered_edge(dest) {
                    return self.resize(r.shave(edge, dest));
                }
            }
        }
        // 6. travels with the move
        if source.contains(&r) {
            return self.resize(r.offset(dest.sheet, dr, dc));
        }
        // 7. overwritten
        if dest.contains(&r) {
            self.invalidate();
            return EditOutcome::Invalidated;
        }
        // 8.
        if r.intersects(dest) {
            EditOutcome::Affected
        } else {
            EditOutcome::NotAffected
        }
    }

    /// Dispatches `edit` to the matching operation.
    pub fn apply_edit(&mut self, edit: &GridEdit, bounds: &GridBounds) -> EditOutcome {
        match *edit {
            GridEdit::RowsInserted { sheet, at, count } => {
                self.on_rows_inserted(sheet, at, count, bounds)
            }
            GridEdit::RowsRemoved { sheet, at, count } => self.on_rows_removed(sheet, at, count),
            GridEdit::ColumnsInserted { sheet, at, count } => {
                self.on_columns_inserted(sheet, at, count, bounds)
            }
            GridEdit::ColumnsRemoved { sheet, at, count } => {
                self.on_columns_removed(sheet, at, count)
            }
            GridEdit::RangeMoved { source, dest } => self.on_range_moved(&source, &dest),
            GridEdit::SheetRemoved { sheet } => self.on_sheet_removed(sheet),
        }
    }

    fn shift_axis(
        &mut self,
        axis: Axis,
        sheet: SheetId,
        edit: impl Fn(u32, u32) -> SpanEdit,
    ) -> EditOutcome {
        if !self.is_valid() || self.sheet() != Some(sheet) {
            return EditOutcome::NotAffected;
        }
        let span = match (axis, self.kind()) {
            (Axis::Rows, ReferenceKind::Cell(c)) => edit(c.row, c.row),
            (Axis::Columns, ReferenceKind::Cell(c)) => edit(c.col, c.col),
            (Axis::Rows, ReferenceKind::CellRange(r)) => edit(r.start.row, r.finish.row),
            (Axis::Columns, ReferenceKind::CellRange(r)) => edit(r.start.col, r.finish.col),
            (Axis::Rows, ReferenceKind::RowRange(b))
            | (Axis::Columns, ReferenceKind::ColumnRange(b)) => edit(b.start, b.finish),
            _ => SpanEdit::Unchanged,
        };
        let (start, finish) = match span {
            SpanEdit::Unchanged => return EditOutcome::NotAffected,
            SpanEdit::Gone => {
                self.invalidate();
                return EditOutcome::Invalidated;
            }
            SpanEdit::Moved(s, f) => (s, f),
        };
        match (axis, self.kind_mut()) {
            (Axis::Rows, ReferenceKind::Cell(c)) => c.row = start,
            (Axis::Columns, ReferenceKind::Cell(c)) => c.col = start,
            (Axis::Rows, ReferenceKind::CellRange(r)) => {
                r.start.row = start;
                r.finish.row = finish;
            }
            (Axis::Columns, ReferenceKind::CellRange(r)) => {
                r.start.col = start;
                r.finish.col = finish;
            }
            (_, ReferenceKind::RowRange(b)) | (_, ReferenceKind::ColumnRange(b)) => {
                b.start = start;
                b.finish = finish;
            }
            _ => {}
        }
        self.compute_hash();
        EditOutcome::Affected
    }

    /// Replaces the covered area. Bands keep their shape or stay put.
    fn resize(&mut self, area: Option<Area>) -> EditOutcome {
        let Some(area) = area else {
            self.invalidate();
            return EditOutcome::Invalidated;
        };
        match self.kind_mut() {
            ReferenceKind::Cell(c) => {
                if area.height() != 1 || area.width() != 1 {
                    return EditOutcome::Affected;
                }
                c.sheet = area.sheet;
                c.row = area.top;
                c.col = area.left;
            }
            ReferenceKind::CellRange(r) => *r = CellRangeRef::from_area(&area),
            ReferenceKind::RowRange(b) => {
                if !area.is_full_width() {
                    return EditOutcome::Affected;
                }
                b.sheet = area.sheet;
                b.start = area.top;
                b.finish = area.bottom;
            }
            ReferenceKind::ColumnRange(b) => {
                if !area.is_full_height() {
                    return EditOutcome::Affected;
                }
                b.sheet = area.sheet;
                b.start = area.left;
                b.finish = area.right;
            }
            _ => return EditOutcome::NotAffected,
        }
        self.compute_hash();
        EditOutcome::Affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::BandRef;
    use cellgraph_common::MAX_ROW;

    fn range(top: u32, left: u32, bottom: u32, right: u32) -> Reference {
        Reference::range(0, top, left, bottom, right).unwrap()
    }

    fn area(sheet: SheetId, top: u32, left: u32, bottom: u32, right: u32) -> Area {
        Area::new(sheet, top, left, bottom, right)
    }

    fn rows(start: u32, finish: u32) -> Reference {
        Reference::from_kind(ReferenceKind::RowRange(BandRef {
            sheet: 0,
            start,
            finish,
        }))
    }

    #[test]
    fn insert_shifts_at_and_after() {
        let b = GridBounds::default();
        let mut c = Reference::cell(0, 3, 2).unwrap();
        assert_eq!(c.on_rows_inserted(0, 1, 2, &b), EditOutcome::Affected);
        assert_eq!(c, Reference::cell(0, 5, 2).unwrap());
        assert!(c.hash_is_current());

        let mut before = Reference::cell(0, 3, 2).unwrap();
        assert_eq!(before.on_rows_inserted(0, 4, 2, &b), EditOutcome::NotAffected);
        assert_eq!(before.on_rows_inserted(1, 1, 2, &b), EditOutcome::NotAffected);

        let mut straddling = range(2, 1, 6, 1);
        assert_eq!(straddling.on_rows_inserted(0, 4, 3, &b), EditOutcome::Affected);
        assert_eq!(straddling, range(2, 1, 9, 1));
    }

    #[test]
    fn insert_past_grid_edge_clips_or_invalidates() {
        let b = GridBounds::new(10, 10);
        let mut r = range(5, 1, 9, 1);
        assert_eq!(r.on_rows_inserted(0, 6, 3, &b), EditOutcome::Affected);
        assert_eq!(r, range(5, 1, 10, 1));

        let mut c = Reference::cell(0, 9, 1).unwrap();
        assert_eq!(c.on_rows_inserted(0, 1, 2, &b), EditOutcome::Invalidated);
        assert!(!c.is_valid());
    }

    #[test]
    fn remove_clips_partial_overlap() {
        let mut below = range(3, 1, 8, 1);
        assert_eq!(below.on_rows_removed(0, 5, 10), EditOutcome::Affected);
        assert_eq!(below, range(3, 1, 4, 1));

        let mut above = range(3, 1, 8, 1);
        assert_eq!(above.on_rows_removed(0, 1, 4), EditOutcome::Affected);
        assert_eq!(above, range(1, 1, 4, 1));

        let mut around = range(3, 1, 8, 1);
        assert_eq!(around.on_rows_removed(0, 5, 2), EditOutcome::Affected);
        assert_eq!(around, range(3, 1, 6, 1));

        let mut after = range(10, 1, 12, 1);
        assert_eq!(after.on_rows_removed(0, 2, 3), EditOutcome::Affected);
        assert_eq!(after, range(7, 1, 9, 1));
    }

    #[test]
    fn remove_whole_span_invalidates() {
        let mut r = range(1, 1, 5, 1);
        assert_eq!(r.on_rows_removed(0, 1, 5), EditOutcome::Invalidated);
        assert!(!r.is_valid());
        // invalid references never change again
        assert_eq!(r.on_rows_removed(0, 1, 5), EditOutcome::NotAffected);

        let mut c = Reference::cell(0, 4, 4).unwrap();
        assert_eq!(c.on_columns_removed(0, 3, 2), EditOutcome::Invalidated);
    }

    #[test]
    fn bands_ignore_the_other_axis() {
        let mut r = rows(3, 5);
        assert_eq!(r.on_columns_removed(0, 1, 3), EditOutcome::NotAffected);
        assert_eq!(r.on_rows_removed(0, 4, 1), EditOutcome::Affected);
        assert_eq!(r, rows(3, 4));
    }

    #[test]
    fn null_move_changes_nothing() {
        let mut r = range(1, 1, 10, 1);
        let s = area(0, 1, 1, 3, 1);
        assert_eq!(r.on_range_moved(&s, &s), EditOutcome::NotAffected);
        assert_eq!(r, range(1, 1, 10, 1));
        assert!(r.is_valid());
    }

    #[test]
    fn edge_pulled_to_other_sheet() {
        let mut r = range(1, 1, 10, 1);
        let out = r.on_range_moved(&area(0, 1, 1, 3, 2), &area(1, 1, 1, 3, 2));
        assert_eq!(out, EditOutcome::Affected);
        assert_eq!(r, range(4, 1, 10, 1));
    }

    #[test]
    fn edge_pulled_in_from_other_sheet() {
        let mut r = Reference::range(1, 1, 1, 10, 1).unwrap();
        let out = r.on_range_moved(&area(0, 1, 1, 3, 2), &area(1, 1, 1, 3, 2));
        assert_eq!(out, EditOutcome::Affected);
        assert_eq!(r, Reference::range(1, 4, 1, 10, 1).unwrap());
    }

    #[test]
    fn edge_slab_moved_outward_expands() {
        let mut r = range(1, 1, 10, 2);
        let out = r.on_range_moved(&area(0, 10, 1, 10, 2), &area(0, 12, 1, 12, 2));
        assert_eq!(out, EditOutcome::Affected);
        assert_eq!(r, range(1, 1, 12, 2));
    }

    #[test]
    fn edge_slab_moved_inward_shrinks() {
        let mut r = range(1, 1, 10, 2);
        let out = r.on_range_moved(&area(0, 9, 1, 10, 2), &area(0, 6, 1, 7, 2));
        assert_eq!(out, EditOutcome::Affected);
        assert_eq!(r, range(1, 1, 8, 2));

        let mut top = range(1, 1, 10, 2);
        top.on_range_moved(&area(0, 1, 1, 2, 2), &area(0, 4, 1, 5, 2));
        assert_eq!(top, range(3, 1, 10, 2));
    }

    #[test]
    fn destination_shaves_covered_edge() {
        let mut r = range(1, 1, 10, 1);
        let out = r.on_range_moved(&area(0, 8, 3, 12, 3), &area(0, 8, 1, 12, 1));
        assert_eq!(out, EditOutcome::Affected);
        assert_eq!(r, range(1, 1, 7, 1));
    }

    #[test]
    fn contained_reference_travels() {
        let mut r = range(2, 2, 3, 3);
        let out = r.on_range_moved(&area(0, 1, 1, 4, 4), &area(0, 11, 2, 14, 5));
        assert_eq!(out, EditOutcome::Affected);
        assert_eq!(r, range(12, 3, 13, 4));

        let mut c = Reference::cell(0, 2, 2).unwrap();
        c.on_range_moved(&area(0, 1, 1, 4, 4), &area(3, 1, 1, 4, 4));
        assert_eq!(c, Reference::cell(3, 2, 2).unwrap());
    }

    #[test]
    fn overwritten_reference_is_invalidated() {
        let mut r = range(20, 1, 21, 1);
        let out = r.on_range_moved(&area(0, 1, 1, 5, 2), &area(0, 18, 1, 22, 2));
        assert_eq!(out, EditOutcome::Invalidated);
        assert!(!r.is_valid());
    }

    #[test]
    fn partial_overlap_is_affected_only() {
        let mut r = range(1, 1, 3, 3);
        let out = r.on_range_moved(&area(0, 5, 5, 6, 6), &area(0, 2, 2, 3, 3));
        assert_eq!(out, EditOutcome::Affected);
        assert_eq!(r, range(1, 1, 3, 3));

        let mut far = range(1, 1, 3, 3);
        let out = far.on_range_moved(&area(0, 5, 5, 6, 6), &area(0, 8, 8, 9, 9));
        assert_eq!(out, EditOutcome::NotAffected);
    }

    #[test]
    fn row_band_moved_off_sheet_loses_top_rows() {
        let mut r = rows(1, 10);
        let out = r.on_range_moved(
            &Area::rows(0, 1, 3),
            &Area::rows(1, 1, 3),
        );
        assert_eq!(out, EditOutcome::Affected);
        assert_eq!(r, rows(4, 10));
        assert!(Area::rows(0, 1, MAX_ROW).is_full_width());
    }

    #[test]
    fn sheet_removal_invalidates_grid_refs_only() {
        let mut c = Reference::cell(2, 1, 1).unwrap();
        assert_eq!(c.on_sheet_removed(2), EditOutcome::Invalidated);
        let mut n = Reference::named("x");
        assert_eq!(n.on_sheet_removed(2), EditOutcome::NotAffected);
    }

    #[test]
    fn touches_filters_by_sheet() {
        let edit = GridEdit::RowsInserted { sheet: 1, at: 1, count: 1 };
        assert!(!edit.touches(&Reference::cell(0, 1, 1).unwrap()));
        assert!(edit.touches(&Reference::cell(1, 1, 1).unwrap()));
        assert!(!edit.touches(&Reference::volatile()));
    }
}
