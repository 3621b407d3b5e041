//! Formula engine: binds formulas to references, keeps the dependency graph
//! current and drives recalculation and structural edits.

pub mod formula_engine;
pub mod snapshot;
pub mod structural;

#[cfg(test)]
mod tests;

pub use formula_engine::{EngineEvent, FormulaEngine};
pub use snapshot::GraphSnapshot;
pub use structural::ShiftSummary;

use cellgraph_common::GridBounds;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the formula engine
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub bounds: GridBounds,
    /// Recalculate everything reachable from the affected references after a
    /// structural edit.
    pub recalculate_on_edit: bool,
    /// Write `#REF!` into the cell of every formula an edit breaks.
    pub write_ref_errors: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bounds: GridBounds::default(),
            recalculate_on_edit: true,
            write_ref_errors: true,
        }
    }
}

impl EngineConfig {
    pub fn with_bounds(mut self, max_row: u32, max_column: u32) -> Self {
        self.bounds = GridBounds::new(max_row, max_column);
        self
    }

    pub fn with_recalculate_on_edit(mut self, on: bool) -> Self {
        self.recalculate_on_edit = on;
        self
    }

    pub fn with_write_ref_errors(mut self, on: bool) -> Self {
        self.write_ref_errors = on;
        self
    }
}
