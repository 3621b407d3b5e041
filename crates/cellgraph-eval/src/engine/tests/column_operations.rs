use cellgraph_common::{ExcelError, LiteralValue};

use super::common::*;
use crate::engine::EngineEvent;

#[test]
fn test_insert_columns_moves_formula_and_dependency() {
    let mut engine = engine();
    put(&mut engine, 1, 2, 4.0);
    // C1 = B1*3
    engine.add_formula(times(cell(1, 2), 3.0), cell(1, 3)).unwrap();

    engine.workbook_mut().insert_columns(SHEET1, 2, 1);
    let summary = engine.columns_inserted(SHEET1, 2, 1).unwrap();

    assert!(engine.formula(&cell(1, 4)).is_some());
    assert!(engine.lookup(&cell(1, 3)).is_some());
    assert!(engine.lookup(&cell(1, 2)).is_none());
    assert_eq!(summary.references_adjusted, 2);
    assert_eq!(get(&engine, 1, 4), LiteralValue::Number(12.0));
}

#[test]
fn test_insert_columns_left_edge_and_inside() {
    let mut engine = engine();
    // A5 = SUM(B1:D1)
    engine
        .add_formula(sum_of(vec![range(1, 2, 1, 4)]), cell(5, 1))
        .unwrap();
    // inserting at the first column shifts the whole range
    engine.columns_inserted(SHEET1, 2, 2).unwrap();
    assert!(engine.lookup(&range(1, 4, 1, 6)).is_some());
    // inserting inside stretches it
    engine.columns_inserted(SHEET1, 5, 1).unwrap();
    assert!(engine.lookup(&range(1, 4, 1, 7)).is_some());
    assert!(engine.formula(&cell(5, 1)).is_some());
}

#[test]
fn test_remove_columns_shrinks_and_recalculates() {
    let mut engine = engine();
    for col in 1..=4 {
        put(&mut engine, 1, col, 10.0 * col as f64);
    }
    // A3 = SUM(A1:D1)
    engine
        .add_formula(sum_of(vec![range(1, 1, 1, 4)]), cell(3, 1))
        .unwrap();

    engine.workbook_mut().remove_columns(SHEET1, 2, 2);
    let summary = engine.columns_removed(SHEET1, 2, 2).unwrap();

    assert!(engine.lookup(&range(1, 1, 1, 2)).is_some());
    assert_eq!(summary.recalculated, vec![cell(3, 1)]);
    // 10 + 40
    assert_eq!(get(&engine, 3, 1), LiteralValue::Number(50.0));
}

#[test]
fn test_remove_whole_range_columns_breaks_formula() {
    let mut engine = engine();
    let events = record_events(&mut engine);
    // F2 = SUM(B1:C9)
    engine
        .add_formula(sum_of(vec![range(1, 2, 9, 3)]), cell(2, 6))
        .unwrap();

    engine.workbook_mut().remove_columns(SHEET1, 2, 2);
    let summary = engine.columns_removed(SHEET1, 2, 2).unwrap();

    assert_eq!(summary.formulas_invalidated, vec![cell(2, 4)]);
    assert_eq!(
        get(&engine, 2, 4),
        LiteralValue::from(ExcelError::invalid_reference())
    );
    assert_eq!(
        *events.borrow(),
        vec![EngineEvent::FormulasInvalidated {
            references: vec![cell(2, 4)]
        }]
    );
}

#[test]
fn test_column_band_survives_row_edits() {
    let mut engine = engine();
    let factory = *engine.factory();
    let band = factory.columns(SHEET1, 2, 3).unwrap();
    engine.add_formula(sum_of(vec![band.clone()]), cell(1, 8)).unwrap();

    engine.rows_inserted(SHEET1, 1, 4).unwrap();
    assert!(engine.lookup(&band).is_some());
    assert!(engine.formula(&cell(5, 8)).is_some());

    engine.columns_inserted(SHEET1, 1, 1).unwrap();
    assert!(engine.lookup(&factory.columns(SHEET1, 3, 4).unwrap()).is_some());
    assert!(engine.formula(&cell(5, 9)).is_some());
}
