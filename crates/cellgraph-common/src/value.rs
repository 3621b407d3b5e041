use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

use crate::ExcelError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A cell value as read from or written to a sheet.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LiteralValue {
    Int(i64),
    Number(f64),
    Text(String),
    Boolean(bool),
    #[default]
    Empty,
    Error(ExcelError),
}

impl Hash for LiteralValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            LiteralValue::Int(i) => i.hash(state),
            LiteralValue::Number(n) => n.to_bits().hash(state),
            LiteralValue::Text(s) => s.hash(state),
            LiteralValue::Boolean(b) => b.hash(state),
            LiteralValue::Empty => state.write_u8(0),
            LiteralValue::Error(e) => e.hash(state),
        }
    }
}

impl Eq for LiteralValue {}

impl Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Int(i) => write!(f, "{i}"),
            LiteralValue::Number(n) => write!(f, "{n}"),
            LiteralValue::Text(s) => write!(f, "{s}"),
            LiteralValue::Boolean(b) => write!(f, "{b}"),
            LiteralValue::Error(e) => write!(f, "{e}"),
            LiteralValue::Empty => write!(f, ""),
        }
    }
}

impl LiteralValue {
    /// Numeric view used by simple evaluators; text and errors have none.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            LiteralValue::Int(i) => Some(*i as f64),
            LiteralValue::Number(n) => Some(*n),
            LiteralValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            LiteralValue::Empty => Some(0.0),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LiteralValue::Error(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, LiteralValue::Empty)
    }
}

impl From<f64> for LiteralValue {
    fn from(n: f64) -> Self {
        LiteralValue::Number(n)
    }
}

impl From<i64> for LiteralValue {
    fn from(i: i64) -> Self {
        LiteralValue::Int(i)
    }
}

impl From<bool> for LiteralValue {
    fn from(b: bool) -> Self {
        LiteralValue::Boolean(b)
    }
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        LiteralValue::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExcelErrorKind;

    #[test]
    fn numeric_view() {
        assert_eq!(LiteralValue::Int(3).as_number(), Some(3.0));
        assert_eq!(LiteralValue::Empty.as_number(), Some(0.0));
        assert_eq!(LiteralValue::from("x").as_number(), None);
        assert!(LiteralValue::from(ExcelError::new(ExcelErrorKind::Ref)).is_error());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_keeps_error_kind() {
        let v = LiteralValue::Error(ExcelError::invalid_reference());
        let json = serde_json::to_string(&v).unwrap();
        let back: LiteralValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
