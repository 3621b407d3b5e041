//! Addressable locations a formula can read from or be bound to.
//!
//! ## Design goals
//! * **One tagged union**: every location kind is a [`ReferenceKind`] variant,
//!   and structural edits are a `match` per operation (see [`grid_ops`]).
//! * **Explicit structural key**: the kind *is* the pool key. Equality and the
//!   one-at-a-time hash only look at the variant tag and its coordinates or
//!   folded name, never at `valid` or the cached hash.
//! * **Two equalities**: structural equality (pooling) and circular-reference
//!   equality (identity, or intersection as soon as a range is involved).
//!
//! ```text
//!   factory / compiler ──▶ Reference ──▶ ReferencePool ──▶ RefId ──▶ DependencyManager
//!                           (value)       (canonical)       (handle)    (edges)
//! ```

use core::fmt;
use std::hash::{Hash, Hasher};

use cellgraph_common::{SheetId, col_to_letters};

pub mod area;
pub mod factory;
pub mod grid_ops;
pub mod hash;

pub use area::{Area, Edge};
pub use factory::ReferenceFactory;
pub use grid_ops::{EditOutcome, GridEdit};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A 1-based (row, column) position.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct GridPoint {
    pub row: u32,
    pub col: u32,
}

impl GridPoint {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CellRef {
    pub sheet: SheetId,
    pub row: u32,
    pub col: u32,
}

/// Rectangular block; `start` is always the top-left corner.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CellRangeRef {
    pub sheet: SheetId,
    pub start: GridPoint,
    pub finish: GridPoint,
}

impl CellRangeRef {
    pub(crate) fn from_area(area: &Area) -> Self {
        Self {
            sheet: area.sheet,
            start: GridPoint::new(area.top, area.left),
            finish: GridPoint::new(area.bottom, area.right),
        }
    }
}

/// Whole rows (`RowRange`) or whole columns (`ColumnRange`), `start ≤ finish`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BandRef {
    pub sheet: SheetId,
    pub start: u32,
    pub finish: u32,
}

/// Case-insensitive symbolic name. Keeps the spelling it was created with for
/// display; compares and hashes on the upper-cased form.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct NameRef {
    display: String,
    folded: String,
}

impl NameRef {
    pub fn new(name: &str) -> Self {
        Self {
            display: name.to_string(),
            folded: name.to_uppercase(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }

    pub fn folded(&self) -> &str {
        &self.folded
    }
}

impl PartialEq for NameRef {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for NameRef {}

/// Opaque identity of an engine-external binding.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ExternalId(pub u64);

/// Structural part of a reference; this is what the pool keys on.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReferenceKind {
    Cell(CellRef),
    CellRange(CellRangeRef),
    RowRange(BandRef),
    ColumnRange(BandRef),
    Named(NameRef),
    External(ExternalId),
    VolatileFunction,
}

impl ReferenceKind {
    #[inline]
    fn tag(&self) -> u8 {
        match self {
            ReferenceKind::Cell(_) => 1,
            ReferenceKind::CellRange(_) => 2,
            ReferenceKind::RowRange(_) => 3,
            ReferenceKind::ColumnRange(_) => 4,
            ReferenceKind::Named(_) => 5,
            ReferenceKind::External(_) => 6,
            ReferenceKind::VolatileFunction => 7,
        }
    }
}

impl Hash for ReferenceKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.tag());
        match self {
            ReferenceKind::Cell(c) => {
                state.write_u16(c.sheet);
                state.write_u32(c.row);
                state.write_u32(c.col);
            }
            ReferenceKind::CellRange(r) => {
                state.write_u16(r.sheet);
                state.write_u32(r.start.row);
                state.write_u32(r.start.col);
                state.write_u32(r.finish.row);
                state.write_u32(r.finish.col);
            }
            ReferenceKind::RowRange(b) | ReferenceKind::ColumnRange(b) => {
                state.write_u16(b.sheet);
                state.write_u32(b.start);
                state.write_u32(b.finish);
            }
            ReferenceKind::Named(n) => state.write(n.folded.as_bytes()),
            ReferenceKind::External(id) => state.write_u64(id.0),
            ReferenceKind::VolatileFunction => {}
        }
    }
}

/// A location plus its validity flag and cached structural hash.
#[derive(Clone, Debug)]
pub struct Reference {
    kind: ReferenceKind,
    valid: bool,
    hash: u32,
}

impl Reference {
    pub(crate) fn from_kind(kind: ReferenceKind) -> Self {
        let mut r = Self {
            kind,
            valid: true,
            hash: 0,
        };
        r.compute_hash();
        r
    }

    /// Cell on sheet `sheet`, checked against the default grid bounds.
    pub fn cell(sheet: SheetId, row: u32, col: u32) -> Result<Self, crate::EngineError> {
        ReferenceFactory::default().cell(sheet, row, col)
    }

    /// Block with corners in any order, checked against the default grid bounds.
    pub fn range(
        sheet: SheetId,
        row1: u32,
        col1: u32,
        row2: u32,
        col2: u32,
    ) -> Result<Self, crate::EngineError> {
        ReferenceFactory::default().range(sheet, row1, col1, row2, col2)
    }

    pub fn named(name: &str) -> Self {
        Self::from_kind(ReferenceKind::Named(NameRef::new(name)))
    }

    /// The volatile-builtin marker. Every instance is structurally equal.
    pub fn volatile() -> Self {
        Self::from_kind(ReferenceKind::VolatileFunction)
    }

    #[inline]
    pub fn kind(&self) -> &ReferenceKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut ReferenceKind {
        &mut self.kind
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Marks the reference permanently unusable.
    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Cached one-at-a-time hash of the structural key.
    #[inline]
    pub fn structural_hash(&self) -> u32 {
        self.hash
    }

    /// Recomputes the cached hash. Must follow every coordinate mutation.
    pub fn compute_hash(&mut self) {
        self.hash = hash::structural_hash(&self.kind);
    }

    #[cfg(test)]
    pub(crate) fn hash_is_current(&self) -> bool {
        self.hash == hash::structural_hash(&self.kind)
    }

    /// True only for range-shaped variants.
    #[inline]
    pub fn can_range_link(&self) -> bool {
        matches!(
            self.kind,
            ReferenceKind::CellRange(_) | ReferenceKind::RowRange(_) | ReferenceKind::ColumnRange(_)
        )
    }

    #[inline]
    pub fn is_volatile_marker(&self) -> bool {
        matches!(self.kind, ReferenceKind::VolatileFunction)
    }

    /// Sheet of a grid-bound reference.
    pub fn sheet(&self) -> Option<SheetId> {
        match &self.kind {
            ReferenceKind::Cell(c) => Some(c.sheet),
            ReferenceKind::CellRange(r) => Some(r.sheet),
            ReferenceKind::RowRange(b) | ReferenceKind::ColumnRange(b) => Some(b.sheet),
            _ => None,
        }
    }

    /// The block of cells a grid-bound reference covers.
    pub fn area(&self) -> Option<Area> {
        Some(match &self.kind {
            ReferenceKind::Cell(c) => Area::cell(c.sheet, c.row, c.col),
            ReferenceKind::CellRange(r) => {
                Area::new(r.sheet, r.start.row, r.start.col, r.finish.row, r.finish.col)
            }
            ReferenceKind::RowRange(b) => Area::rows(b.sheet, b.start, b.finish),
            ReferenceKind::ColumnRange(b) => Area::columns(b.sheet, b.start, b.finish),
            _ => return None,
        })
    }

    /// Geometric overlap for grid references, structural equality otherwise.
    pub fn intersects(&self, other: &Reference) -> bool {
        match (self.area(), other.area()) {
            (Some(a), Some(b)) => a.intersects(&b),
            (None, None) => self.kind == other.kind,
            _ => false,
        }
    }

    /// Equality used by cycle detection: a range "equals" anything it overlaps.
    pub fn circular_equals(&self, other: &Reference) -> bool {
        if self.can_range_link() || other.can_range_link() {
            self.intersects(other)
        } else {
            self.kind == other.kind
        }
    }

    /// A1 text, resolving sheet ids through `sheet_name`.
    pub fn to_a1(&self, sheet_name: impl Fn(SheetId) -> Option<String>) -> String {
        let prefix = |sheet: SheetId| match sheet_name(sheet) {
            Some(name) if needs_quotes(&name) => format!("'{}'!", name.replace('\'', "''")),
            Some(name) => format!("{name}!"),
            None => format!("#{sheet}!"),
        };
        match &self.kind {
            ReferenceKind::Cell(c) => {
                format!("{}{}{}", prefix(c.sheet), col_to_letters(c.col), c.row)
            }
            ReferenceKind::CellRange(r) => format!(
                "{}{}{}:{}{}",
                prefix(r.sheet),
                col_to_letters(r.start.col),
                r.start.row,
                col_to_letters(r.finish.col),
                r.finish.row
            ),
            ReferenceKind::RowRange(b) => format!("{}{}:{}", prefix(b.sheet), b.start, b.finish),
            ReferenceKind::ColumnRange(b) => format!(
                "{}{}:{}",
                prefix(b.sheet),
                col_to_letters(b.start),
                col_to_letters(b.finish)
            ),
            ReferenceKind::Named(n) => n.display.clone(),
            ReferenceKind::External(id) => format!("<external {}>", id.0),
            ReferenceKind::VolatileFunction => "<volatile>".to_string(),
        }
    }
}

fn needs_quotes(name: &str) -> bool {
    name.is_empty()
        || name.starts_with(|c: char| c.is_ascii_digit())
        || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// Structural equality: same variant, same coordinates or folded name.
impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Reference {}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1(|_| None))?;
        if !self.valid {
            f.write_str(" (invalid)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independently_built_cells_are_structurally_equal() {
        let a = Reference::cell(0, 3, 2).unwrap();
        let b = Reference::cell(0, 3, 2).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.structural_hash(), b.structural_hash());
        assert_ne!(a, Reference::cell(1, 3, 2).unwrap());
    }

    #[test]
    fn names_fold_case() {
        let a = Reference::named("Total");
        let b = Reference::named("TOTAL");
        assert_eq!(a, b);
        assert_eq!(a.structural_hash(), b.structural_hash());
        assert_eq!(a.to_a1(|_| None), "Total");
    }

    #[test]
    fn variant_tag_separates_equal_coordinates() {
        let rows = Reference::from_kind(ReferenceKind::RowRange(BandRef {
            sheet: 0,
            start: 2,
            finish: 4,
        }));
        let cols = Reference::from_kind(ReferenceKind::ColumnRange(BandRef {
            sheet: 0,
            start: 2,
            finish: 4,
        }));
        assert_ne!(rows, cols);
        assert_ne!(rows.structural_hash(), cols.structural_hash());
    }

    #[test]
    fn circular_equality_uses_intersection_for_ranges() {
        let range = Reference::range(0, 1, 1, 10, 1).unwrap();
        let inside = Reference::cell(0, 5, 1).unwrap();
        let outside = Reference::cell(0, 5, 2).unwrap();
        assert!(range.circular_equals(&inside));
        assert!(inside.circular_equals(&range));
        assert!(!range.circular_equals(&outside));
        assert!(!inside.circular_equals(&Reference::cell(0, 6, 1).unwrap()));
        assert!(inside.circular_equals(&inside.clone()));
    }

    #[test]
    fn only_ranges_link() {
        assert!(Reference::range(0, 1, 1, 2, 2).unwrap().can_range_link());
        assert!(!Reference::cell(0, 1, 1).unwrap().can_range_link());
        assert!(!Reference::named("x").can_range_link());
        assert!(!Reference::volatile().can_range_link());
    }

    #[test]
    fn a1_rendering_quotes_odd_sheet_names() {
        let r = Reference::range(0, 1, 1, 3, 2).unwrap();
        assert_eq!(r.to_a1(|_| Some("Sheet1".into())), "Sheet1!A1:B3");
        assert_eq!(r.to_a1(|_| Some("My Data".into())), "'My Data'!A1:B3");
        assert_eq!(r.to_string(), "#0!A1:B3");
    }
}
