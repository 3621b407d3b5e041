mod column_operations;
pub(super) mod common;
mod sheet_management;
