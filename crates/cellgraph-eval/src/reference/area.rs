//! Rectangle geometry shared by every grid-bound reference.
//!
//! An [`Area`] is an inclusive, normalized block of cells on one sheet. Row and
//! column bands are represented as areas spanning the whole grid on their
//! unbounded axis.

use core::fmt;

use cellgraph_common::{MAX_COLUMN, MAX_ROW, SheetId, col_to_letters};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One of the four sides of an area.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

impl Edge {
    /// True for edges whose slabs are full-width rows.
    #[inline]
    pub fn is_horizontal(self) -> bool {
        matches!(self, Edge::Top | Edge::Bottom)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Area {
    pub sheet: SheetId,
    pub top: u32,
    pub left: u32,
    pub bottom: u32,
    pub right: u32,
}

impl Area {
    /// Builds an area from two corners in any order.
    pub fn new(sheet: SheetId, row1: u32, col1: u32, row2: u32, col2: u32) -> Self {
        Self {
            sheet,
            top: row1.min(row2),
            left: col1.min(col2),
            bottom: row1.max(row2),
            right: col1.max(col2),
        }
    }

    pub fn cell(sheet: SheetId, row: u32, col: u32) -> Self {
        Self::new(sheet, row, col, row, col)
    }

    /// Full-width band of rows.
    pub fn rows(sheet: SheetId, start: u32, finish: u32) -> Self {
        Self::new(sheet, start, 1, finish, MAX_COLUMN)
    }

    /// Full-height band of columns.
    pub fn columns(sheet: SheetId, start: u32, finish: u32) -> Self {
        Self::new(sheet, 1, start, MAX_ROW, finish)
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.right - self.left + 1
    }

    #[inline]
    pub fn is_full_width(&self) -> bool {
        self.left == 1 && self.right == MAX_COLUMN
    }

    #[inline]
    pub fn is_full_height(&self) -> bool {
        self.top == 1 && self.bottom == MAX_ROW
    }

    #[inline]
    pub fn contains(&self, other: &Area) -> bool {
        self.sheet == other.sheet
            && self.top <= other.top
            && self.bottom >= other.bottom
            && self.left <= other.left
            && self.right >= other.right
    }

    #[inline]
    pub fn contains_cell(&self, sheet: SheetId, row: u32, col: u32) -> bool {
        self.sheet == sheet
            && (self.top..=self.bottom).contains(&row)
            && (self.left..=self.right).contains(&col)
    }

    #[inline]
    pub fn intersects(&self, other: &Area) -> bool {
        self.sheet == other.sheet
            && self.top <= other.bottom
            && other.top <= self.bottom
            && self.left <= other.right
            && other.left <= self.right
    }

    pub fn intersection(&self, other: &Area) -> Option<Area> {
        if !self.intersects(other) {
            return None;
        }
        Some(Area {
            sheet: self.sheet,
            top: self.top.max(other.top),
            left: self.left.max(other.left),
            bottom: self.bottom.min(other.bottom),
            right: self.right.min(other.right),
        })
    }

    /// Smallest area covering both; keeps `self`'s sheet.
    pub fn hull(&self, other: &Area) -> Area {
        Area {
            sheet: self.sheet,
            top: self.top.min(other.top),
            left: self.left.min(other.left),
            bottom: self.bottom.max(other.bottom),
            right: self.right.max(other.right),
        }
    }

    /// Translates the area, possibly onto another sheet. `None` when any
    /// corner would leave the grid.
    pub fn offset(&self, sheet: SheetId, drow: i64, dcol: i64) -> Option<Area> {
        let shift = |v: u32, d: i64, max: u32| -> Option<u32> {
            let n = v as i64 + d;
            (1..=max as i64).contains(&n).then_some(n as u32)
        };
        Some(Area {
            sheet,
            top: shift(self.top, drow, MAX_ROW)?,
            left: shift(self.left, dcol, MAX_COLUMN)?,
            bottom: shift(self.bottom, drow, MAX_ROW)?,
            right: shift(self.right, dcol, MAX_COLUMN)?,
        })
    }

    /// The one-cell-thick strip along `edge`.
    pub fn edge(&self, edge: Edge) -> Area {
        match edge {
            Edge::Top => Area { bottom: self.top, ..*self },
            Edge::Bottom => Area { top: self.bottom, ..*self },
            Edge::Left => Area { right: self.left, ..*self },
            Edge::Right => Area { left: self.right, ..*self },
        }
    }

    /// First edge of `self` lying wholly inside `cover`.
    pub fn covered_edge(&self, cover: &Area) -> Option<Edge> {
        [Edge::Top, Edge::Bottom, Edge::Left, Edge::Right]
            .into_iter()
            .find(|&e| cover.contains(&self.edge(e)))
    }

    /// If `self` is a proper slab of `outer` (spans it completely on one axis
    /// and touches one side), the side it touches.
    pub fn slab_edge_of(&self, outer: &Area) -> Option<Edge> {
        if !outer.contains(self) || self == outer {
            return None;
        }
        if self.left == outer.left && self.right == outer.right {
            if self.top == outer.top {
                return Some(Edge::Top);
            }
            if self.bottom == outer.bottom {
                return Some(Edge::Bottom);
            }
        }
        if self.top == outer.top && self.bottom == outer.bottom {
            if self.left == outer.left {
                return Some(Edge::Left);
            }
            if self.right == outer.right {
                return Some(Edge::Right);
            }
        }
        None
    }

    /// Removes the part of `self` covered by `cover` on the `edge` side.
    /// `cover` must contain that edge; `None` when nothing would remain.
    pub fn shave(&self, edge: Edge, cover: &Area) -> Option<Area> {
        let mut out = *self;
        match edge {
            Edge::Top => out.top = cover.bottom.checked_add(1)?,
            Edge::Bottom => out.bottom = cover.top.checked_sub(1)?,
            Edge::Left => out.left = cover.right.checked_add(1)?,
            Edge::Right => out.right = cover.left.checked_sub(1)?,
        }
        (out.top <= out.bottom && out.left <= out.right).then_some(out)
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{}!{}{}:{}{}",
            self.sheet,
            col_to_letters(self.left),
            self.top,
            col_to_letters(self.right),
            self.bottom
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(top: u32, left: u32, bottom: u32, right: u32) -> Area {
        Area::new(0, top, left, bottom, right)
    }

    #[test]
    fn new_normalizes_corners() {
        assert_eq!(Area::new(0, 5, 4, 1, 2), a(1, 2, 5, 4));
    }

    #[test]
    fn intersection_requires_same_sheet() {
        let x = a(1, 1, 5, 5);
        let y = Area::new(1, 1, 1, 5, 5);
        assert!(!x.intersects(&y));
        assert_eq!(x.intersection(&a(4, 4, 9, 9)), Some(a(4, 4, 5, 5)));
        assert_eq!(x.intersection(&a(6, 1, 9, 9)), None);
    }

    #[test]
    fn slab_detection() {
        let r = a(1, 1, 10, 3);
        assert_eq!(a(1, 1, 2, 3).slab_edge_of(&r), Some(Edge::Top));
        assert_eq!(a(10, 1, 10, 3).slab_edge_of(&r), Some(Edge::Bottom));
        assert_eq!(a(1, 3, 10, 3).slab_edge_of(&r), Some(Edge::Right));
        assert_eq!(a(2, 1, 3, 3).slab_edge_of(&r), None);
        assert_eq!(r.slab_edge_of(&r), None);
    }

    #[test]
    fn shave_removes_covered_slab() {
        let r = a(1, 1, 10, 1);
        let cover = a(1, 1, 3, 2);
        assert_eq!(r.covered_edge(&cover), Some(Edge::Top));
        assert_eq!(r.shave(Edge::Top, &cover), Some(a(4, 1, 10, 1)));
        assert_eq!(r.shave(Edge::Bottom, &a(10, 1, 12, 1)), Some(a(1, 1, 9, 1)));
        assert_eq!(r.shave(Edge::Top, &a(1, 1, 10, 1)), None);
    }

    #[test]
    fn offset_rejects_leaving_grid() {
        assert_eq!(a(2, 2, 3, 3).offset(1, -1, 2), Some(Area::new(1, 1, 4, 2, 5)));
        assert_eq!(a(2, 2, 3, 3).offset(0, -2, 0), None);
        assert_eq!(Area::rows(0, 1, MAX_ROW).offset(0, 1, 0), None);
    }
}
