//! Grid limits and A1 column-letter helpers.
//!
//! All indices in cellgraph are **1-based** and inclusive, matching what a user
//! sees in A1 notation. The default limits are Excel's: 1,048,576 rows ×
//! 16,384 columns.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const ROW_BITS: u32 = 20;
const COL_BITS: u32 = 14;

/// Largest valid 1-based row index.
pub const MAX_ROW: u32 = 1 << ROW_BITS;
/// Largest valid 1-based column index.
pub const MAX_COLUMN: u32 = 1 << COL_BITS;

/// Sheet identifier inside a workbook.
pub type SheetId = u16;

/// Errors returned when a coordinate falls outside the grid.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BoundsError {
    Row(u32),
    Column(u32),
}

impl fmt::Display for BoundsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundsError::Row(row) => write!(f, "row {row} is outside the grid"),
            BoundsError::Column(col) => write!(f, "column {col} is outside the grid"),
        }
    }
}

impl std::error::Error for BoundsError {}

/// Inclusive upper bounds of the addressable grid.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct GridBounds {
    pub max_row: u32,
    pub max_column: u32,
}

impl Default for GridBounds {
    fn default() -> Self {
        Self {
            max_row: MAX_ROW,
            max_column: MAX_COLUMN,
        }
    }
}

impl GridBounds {
    pub const fn new(max_row: u32, max_column: u32) -> Self {
        Self {
            max_row,
            max_column,
        }
    }

    #[inline]
    pub fn check_row(&self, row: u32) -> Result<u32, BoundsError> {
        if row == 0 || row > self.max_row {
            Err(BoundsError::Row(row))
        } else {
            Ok(row)
        }
    }

    #[inline]
    pub fn check_column(&self, col: u32) -> Result<u32, BoundsError> {
        if col == 0 || col > self.max_column {
            Err(BoundsError::Column(col))
        } else {
            Ok(col)
        }
    }

    #[inline]
    pub fn check(&self, row: u32, col: u32) -> Result<(), BoundsError> {
        self.check_row(row)?;
        self.check_column(col)?;
        Ok(())
    }
}

/// Convert a 1-based column index into letters (1 ⇒ A, 27 ⇒ AA, …).
pub fn col_to_letters(col: u32) -> String {
    let mut buf = Vec::new();
    let mut n = col;
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        buf.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

/// Convert letters (case-insensitive) back to a 1-based column index.
pub fn letters_to_col(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for ch in s.bytes() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let val = (ch.to_ascii_uppercase() - b'A') as u32 + 1;
        col = col.checked_mul(26)?.checked_add(val)?;
    }
    Some(col)
}
