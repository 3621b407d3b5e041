//! Compiled formulas as the engine sees them: a list of dependency references
//! plus an opaque evaluator.

use core::fmt;

use cellgraph_common::{ExcelError, ExcelErrorKind, LiteralValue};
use rustc_hash::FxHashMap;

use crate::reference::{Reference, ReferenceKind};
use crate::sheet::Workbook;

/// Produces a formula's value from already-resolved inputs.
pub trait Evaluator {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> LiteralValue;
}

impl<F> Evaluator for F
where
    F: Fn(&EvalContext<'_>) -> LiteralValue,
{
    fn evaluate(&self, ctx: &EvalContext<'_>) -> LiteralValue {
        self(ctx)
    }
}

pub struct Formula {
    text: String,
    dependencies: Vec<Reference>,
    evaluator: Box<dyn Evaluator>,
}

impl Formula {
    /// Keeps the first occurrence of each structurally distinct, valid
    /// dependency, in order.
    pub fn new(
        dependencies: impl IntoIterator<Item = Reference>,
        evaluator: impl Evaluator + 'static,
    ) -> Self {
        let mut deps: Vec<Reference> = Vec::new();
        for r in dependencies {
            if r.is_valid() && !deps.contains(&r) {
                deps.push(r);
            }
        }
        Self {
            text: String::new(),
            dependencies: deps,
            evaluator: Box::new(evaluator),
        }
    }

    /// Same as [`Formula::new`] with a closure evaluator.
    pub fn from_fn<F>(dependencies: impl IntoIterator<Item = Reference>, f: F) -> Self
    where
        F: Fn(&EvalContext<'_>) -> LiteralValue + 'static,
    {
        Self::new(dependencies, f)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn dependency_references(&self) -> &[Reference] {
        &self.dependencies
    }

    pub(crate) fn set_dependency_references(&mut self, deps: Vec<Reference>) {
        self.dependencies = deps;
    }

    pub fn uses_volatile(&self) -> bool {
        self.dependencies.iter().any(Reference::is_volatile_marker)
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> LiteralValue {
        self.evaluator.evaluate(ctx)
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formula")
            .field("text", &self.text)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Read-only view handed to an evaluator.
pub struct EvalContext<'a> {
    self_reference: &'a Reference,
    dependencies: Vec<&'a Reference>,
    workbook: &'a dyn Workbook,
    bound_values: &'a FxHashMap<ReferenceKind, LiteralValue>,
}

impl<'a> EvalContext<'a> {
    pub(crate) fn new(
        self_reference: &'a Reference,
        dependencies: Vec<&'a Reference>,
        workbook: &'a dyn Workbook,
        bound_values: &'a FxHashMap<ReferenceKind, LiteralValue>,
    ) -> Self {
        Self {
            self_reference,
            dependencies,
            workbook,
            bound_values,
        }
    }

    pub fn self_reference(&self) -> &Reference {
        self.self_reference
    }

    /// Current location of the formula's `index`-th dependency.
    pub fn dependency(&self, index: usize) -> Option<&Reference> {
        self.dependencies.get(index).copied()
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &Reference> {
        self.dependencies.iter().copied()
    }

    /// Value of the `index`-th dependency; `#REF!` when there is none.
    pub fn arg(&self, index: usize) -> LiteralValue {
        match self.dependency(index) {
            Some(r) => self.value(r),
            None => ExcelError::invalid_reference().into(),
        }
    }

    /// Every value covered by the `index`-th dependency.
    pub fn arg_values(&self, index: usize) -> Vec<LiteralValue> {
        match self.dependency(index) {
            Some(r) => self.values(r),
            None => vec![ExcelError::invalid_reference().into()],
        }
    }

    /// Single value behind `reference`. Ranges yield `#VALUE!`.
    pub fn value(&self, reference: &Reference) -> LiteralValue {
        if !reference.is_valid() {
            return ExcelError::invalid_reference().into();
        }
        match reference.kind() {
            ReferenceKind::Cell(c) => match self.workbook.sheet(c.sheet) {
                Some(sheet) => sheet.get(c.row, c.col),
                None => ExcelError::invalid_reference().into(),
            },
            ReferenceKind::Named(_) | ReferenceKind::External(_) => self
                .bound_values
                .get(reference.kind())
                .cloned()
                .unwrap_or_else(|| ExcelError::new(ExcelErrorKind::Name).into()),
            ReferenceKind::VolatileFunction => LiteralValue::Empty,
            _ => ExcelError::new(ExcelErrorKind::Value)
                .with_message("a range cannot be read as one value")
                .into(),
        }
    }

    /// Row-major values of every stored cell position covered by `reference`,
    /// clipped to the sheet's used extent.
    pub fn values(&self, reference: &Reference) -> Vec<LiteralValue> {
        if !reference.is_valid() {
            return vec![ExcelError::invalid_reference().into()];
        }
        let Some(area) = reference.area() else {
            return vec![self.value(reference)];
        };
        let Some(sheet) = self.workbook.sheet(area.sheet) else {
            return vec![ExcelError::invalid_reference().into()];
        };
        let bottom = area.bottom.min(sheet.row_count());
        let right = area.right.min(sheet.column_count());
        let mut out = Vec::new();
        for row in area.top..=bottom {
            for col in area.left..=right {
                out.push(sheet.get(row, col));
            }
        }
        out
    }
}
