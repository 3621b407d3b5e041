//! Reference model, dependency graph and recalculation engine.
//!
//! ```text
//!   Formula ──▶ FormulaEngine ──▶ ReferencePool ──▶ DependencyManager
//!                    │                                   │
//!                    └──── Workbook (Sheet storage) ◀────┘ calculation lists
//! ```

pub mod dependency;
pub mod error;
pub mod formula;
pub mod pool;
pub mod reference;
pub mod sheet;
pub mod test_workbook;

pub mod engine;

pub use dependency::{DependencyManager, DependencyMap};
pub use engine::{EngineConfig, EngineEvent, FormulaEngine, GraphSnapshot, ShiftSummary};
pub use error::EngineError;
pub use formula::{EvalContext, Evaluator, Formula};
pub use pool::{RefId, ReferencePool};
pub use reference::{
    Area, EditOutcome, GridEdit, Reference, ReferenceFactory, ReferenceKind,
};
pub use sheet::{Sheet, SheetRegistry, Workbook};

pub use cellgraph_common::SheetId;
