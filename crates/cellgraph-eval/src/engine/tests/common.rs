//! Common test helpers
use std::cell::RefCell;
use std::rc::Rc;

use cellgraph_common::{LiteralValue, SheetId};

use crate::engine::{EngineConfig, EngineEvent, FormulaEngine};
use crate::formula::Formula;
use crate::reference::Reference;
use crate::sheet::Workbook;
use crate::test_workbook::MemoryWorkbook;

pub const SHEET1: SheetId = 0;
pub const SHEET2: SheetId = 1;

pub type Engine = FormulaEngine<MemoryWorkbook>;

pub fn engine() -> Engine {
    engine_with(EngineConfig::default())
}

pub fn engine_with(config: EngineConfig) -> Engine {
    #[cfg(feature = "tracing")]
    init_tracing();
    let wb = MemoryWorkbook::new().with_sheet("Sheet1").with_sheet("Sheet2");
    FormulaEngine::new(wb, config)
}

/// Routes engine spans to the test writer; filter with `RUST_LOG`.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn cell(row: u32, col: u32) -> Reference {
    Reference::cell(SHEET1, row, col).unwrap()
}

pub fn range(row1: u32, col1: u32, row2: u32, col2: u32) -> Reference {
    Reference::range(SHEET1, row1, col1, row2, col2).unwrap()
}

/// Sum of every numeric value read through every dependency.
pub fn sum_of(deps: Vec<Reference>) -> Formula {
    Formula::from_fn(deps, |ctx| {
        let total: f64 = (0..ctx.dependencies().count())
            .flat_map(|i| ctx.arg_values(i))
            .filter_map(|v| v.as_number())
            .sum();
        LiteralValue::Number(total)
    })
}

/// `dep * factor`.
pub fn times(dep: Reference, factor: f64) -> Formula {
    Formula::from_fn([dep], move |ctx| match ctx.arg(0) {
        LiteralValue::Error(e) => LiteralValue::Error(e),
        v => LiteralValue::Number(v.as_number().unwrap_or(0.0) * factor),
    })
}

/// Counts evaluator invocations.
pub fn counted(deps: Vec<Reference>, hits: Rc<RefCell<usize>>) -> Formula {
    Formula::from_fn(deps, move |_| {
        *hits.borrow_mut() += 1;
        LiteralValue::Int(*hits.borrow() as i64)
    })
}

pub fn put(engine: &mut Engine, row: u32, col: u32, v: impl Into<LiteralValue>) {
    engine
        .workbook_mut()
        .sheet_mut(SHEET1)
        .unwrap()
        .set(row, col, v.into());
}

pub fn get(engine: &Engine, row: u32, col: u32) -> LiteralValue {
    engine.workbook().sheet(SHEET1).unwrap().get(row, col)
}

pub fn record_events(engine: &mut Engine) -> Rc<RefCell<Vec<EngineEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    engine.set_event_handler(move |e| sink.borrow_mut().push(e.clone()));
    log
}

pub fn a1(engine: &Engine, refs: &[Reference]) -> Vec<String> {
    refs.iter().map(|r| engine.a1(r)).collect()
}
