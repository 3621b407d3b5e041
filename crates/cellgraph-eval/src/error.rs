use cellgraph_common::{BoundsError, SheetId};
use thiserror::Error;

use crate::pool::RefId;

/// Contract violations reported by the engine.
///
/// Invalidated references and circular formulas are *not* errors; they are
/// normal graph states surfaced as `#REF!` values and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("{0}")]
    OutOfBounds(#[from] BoundsError),

    #[error("reference is no longer valid")]
    InvalidReference,

    #[error("a formula is already bound to {0}")]
    SelfReferenceOccupied(String),

    #[error("no formula is bound to {0}")]
    FormulaNotFound(String),

    #[error("{0} is not pooled")]
    NotPooled(String),

    #[error("a formula cannot be bound to {0}")]
    UnsupportedSelfReference(String),

    #[error("dependency edge {tail:?} -> {head:?} does not exist")]
    MissingEdge { tail: RefId, head: RefId },

    #[error("dependency edge {tail:?} -> {head:?} already exists")]
    DuplicateEdge { tail: RefId, head: RefId },

    #[error("pooled reference must be detached before it is mutated")]
    AttachedMutation,

    #[error("unknown sheet {0}")]
    UnknownSheet(SheetId),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}
