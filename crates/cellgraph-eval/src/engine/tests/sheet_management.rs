use cellgraph_common::{ExcelError, LiteralValue};

use super::common::*;
use crate::engine::EngineEvent;
use crate::sheet::Workbook;

#[test]
fn test_cross_sheet_dependency_recalculates() {
    let mut engine = engine();
    let factory = *engine.factory();
    let registry = engine.workbook().registry().clone();
    let other = factory.parse("Sheet2!$B$2", SHEET1, &registry).unwrap();
    engine.add_formula(times(other, 3.0), cell(1, 1)).unwrap();

    let order = engine
        .set_cell_value(SHEET2, 2, 2, LiteralValue::Int(5))
        .unwrap();
    assert_eq!(order, vec![cell(1, 1)]);
    assert_eq!(get(&engine, 1, 1), LiteralValue::Number(15.0));
}

#[test]
fn test_sheet_removal_breaks_and_drops_formulas() {
    let mut engine = engine();
    let events = record_events(&mut engine);
    let factory = *engine.factory();
    let on_sheet2 = factory.cell(SHEET2, 1, 1).unwrap();
    engine.add_formula(times(on_sheet2.clone(), 2.0), cell(3, 3)).unwrap();
    engine
        .add_formula(times(cell(1, 1), 2.0), factory.cell(SHEET2, 5, 5).unwrap())
        .unwrap();

    engine.workbook_mut().remove_sheet(SHEET2);
    let summary = engine.sheet_removed(SHEET2).unwrap();

    assert_eq!(
        summary.formulas_removed,
        vec![factory.cell(SHEET2, 5, 5).unwrap()]
    );
    assert_eq!(summary.formulas_invalidated, vec![cell(3, 3)]);
    assert_eq!(summary.references_invalidated, 2);
    assert_eq!(
        get(&engine, 3, 3),
        LiteralValue::from(ExcelError::invalid_reference())
    );
    assert_eq!(engine.formula_count(), 0);
    assert!(engine.pool().is_empty());

    let log = events.borrow();
    let [EngineEvent::FormulasInvalidated { references }] = log.as_slice() else {
        panic!("unexpected events {log:?}");
    };
    assert_eq!(a1(&engine, references), vec!["#1!E5", "Sheet1!C3"]);
}

#[test]
fn test_sheet_removal_leaves_other_sheets_alone() {
    let mut engine = engine();
    engine.add_formula(times(cell(1, 1), 2.0), cell(1, 2)).unwrap();
    let before = engine.snapshot();
    let summary = engine.sheet_removed(SHEET2).unwrap();
    assert_eq!(summary.references_invalidated, 0);
    assert_eq!(engine.snapshot(), before);
}

#[test]
fn test_quoted_sheet_names_in_a1() {
    let mut engine = engine();
    let data = engine.workbook_mut().add_sheet("Q1 Data");
    let target = engine.factory().cell(data, 2, 3).unwrap();
    engine.add_formula(times(target.clone(), 1.0), cell(1, 1)).unwrap();
    assert_eq!(engine.a1(&target), "'Q1 Data'!C2");
    assert_eq!(
        engine.dump_dependency_graph(),
        "'Q1 Data'!C2 -> [Sheet1!A1]"
    );

    let registry = engine.workbook().registry().clone();
    let parsed = engine
        .factory()
        .parse("'q1 data'!C2", SHEET1, &registry)
        .unwrap();
    assert_eq!(parsed, target);
    assert_eq!(
        engine.workbook().sheet(data).map(|s| s.name().to_string()),
        Some("Q1 Data".to_string())
    );
}
