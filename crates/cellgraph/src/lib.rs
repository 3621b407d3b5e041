//! Meta crate re-exporting the cellgraph building blocks. Depend on this crate
//! and opt into `tracing` or `serde` through feature flags; the layered crates
//! stay reachable as [`common`] and [`eval`].

pub use cellgraph_common as common;
pub use cellgraph_eval as eval;

pub use cellgraph_common::{ExcelError, ExcelErrorKind, GridBounds, LiteralValue, SheetId};
pub use cellgraph_eval::test_workbook::{MemorySheet, MemoryWorkbook};
pub use cellgraph_eval::{
    EngineConfig, EngineError, EngineEvent, EvalContext, Evaluator, Formula, FormulaEngine,
    GraphSnapshot, RefId, Reference, ReferenceFactory, ShiftSummary, Sheet, SheetRegistry,
    Workbook,
};
