//! Lightweight in-memory workbook for tests, benches and small hosts.
//!
//! Structural helpers (`insert_rows`, `move_range`, …) only touch stored
//! values. Callers apply the same edit to the engine so references follow.
use std::collections::HashMap;

use cellgraph_common::{LiteralValue, SheetId};

use crate::reference::Area;
use crate::sheet::{Sheet, SheetRegistry, Workbook};

type V = LiteralValue;
type CellKey = (u32, u32); // 1-based (row, col)

#[derive(Default, Clone, Debug)]
pub struct MemorySheet {
    name: String,
    cells: HashMap<CellKey, V>,
}

impl MemorySheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn rekey(&mut self, f: impl Fn(CellKey) -> Option<CellKey>) {
        self.cells = self
            .cells
            .drain()
            .filter_map(|(k, v)| f(k).map(|k| (k, v)))
            .collect();
    }

    pub fn insert_rows(&mut self, at: u32, count: u32) {
        self.rekey(|(r, c)| Some((if r >= at { r + count } else { r }, c)));
    }

    pub fn remove_rows(&mut self, at: u32, count: u32) {
        let end = at + count;
        self.rekey(|(r, c)| match r {
            r if r < at => Some((r, c)),
            r if r < end => None,
            r => Some((r - count, c)),
        });
    }

    pub fn insert_columns(&mut self, at: u32, count: u32) {
        self.rekey(|(r, c)| Some((r, if c >= at { c + count } else { c })));
    }

    pub fn remove_columns(&mut self, at: u32, count: u32) {
        let end = at + count;
        self.rekey(|(r, c)| match c {
            c if c < at => Some((r, c)),
            c if c < end => None,
            c => Some((r, c - count)),
        });
    }

    fn take_area(&mut self, area: &Area) -> Vec<(CellKey, V)> {
        let keys: Vec<CellKey> = self
            .cells
            .keys()
            .copied()
            .filter(|&(r, c)| area.contains_cell(area.sheet, r, c))
            .collect();
        keys.into_iter()
            .filter_map(|k| self.cells.remove(&k).map(|v| (k, v)))
            .collect()
    }
}

impl Sheet for MemorySheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn row_count(&self) -> u32 {
        self.cells.keys().map(|&(r, _)| r).max().unwrap_or(0)
    }

    fn column_count(&self) -> u32 {
        self.cells.keys().map(|&(_, c)| c).max().unwrap_or(0)
    }

    fn get(&self, row: u32, col: u32) -> V {
        self.cells.get(&(row, col)).cloned().unwrap_or(V::Empty)
    }

    fn set(&mut self, row: u32, col: u32, value: V) {
        if value.is_empty() {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
    }
}

#[derive(Default, Debug)]
pub struct MemoryWorkbook {
    registry: SheetRegistry,
    sheets: Vec<Option<MemorySheet>>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or finds) a sheet by name.
    pub fn add_sheet(&mut self, name: &str) -> SheetId {
        let id = self.registry.id_for(name);
        let slot = id as usize;
        if self.sheets.len() <= slot {
            self.sheets.resize_with(slot + 1, || None);
        }
        if self.sheets[slot].is_none() {
            self.sheets[slot] = Some(MemorySheet::new(name));
        }
        id
    }

    pub fn with_sheet(mut self, name: &str) -> Self {
        self.add_sheet(name);
        self
    }

    pub fn with_cell(mut self, sheet: SheetId, row: u32, col: u32, v: V) -> Self {
        if let Some(sh) = self.memory_sheet_mut(sheet) {
            sh.set(row, col, v);
        }
        self
    }

    pub fn registry(&self) -> &SheetRegistry {
        &self.registry
    }

    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.registry
            .get_id(name)
            .filter(|&id| self.memory_sheet(id).is_some())
    }

    pub fn memory_sheet(&self, id: SheetId) -> Option<&MemorySheet> {
        self.sheets.get(id as usize).and_then(Option::as_ref)
    }

    pub fn memory_sheet_mut(&mut self, id: SheetId) -> Option<&mut MemorySheet> {
        self.sheets.get_mut(id as usize).and_then(Option::as_mut)
    }

    /// Drops a sheet's storage. Its id is never reused.
    pub fn remove_sheet(&mut self, id: SheetId) -> Option<MemorySheet> {
        self.sheets.get_mut(id as usize).and_then(Option::take)
    }

    pub fn insert_rows(&mut self, sheet: SheetId, at: u32, count: u32) {
        if let Some(sh) = self.memory_sheet_mut(sheet) {
            sh.insert_rows(at, count);
        }
    }

    pub fn remove_rows(&mut self, sheet: SheetId, at: u32, count: u32) {
        if let Some(sh) = self.memory_sheet_mut(sheet) {
            sh.remove_rows(at, count);
        }
    }

    pub fn insert_columns(&mut self, sheet: SheetId, at: u32, count: u32) {
        if let Some(sh) = self.memory_sheet_mut(sheet) {
            sh.insert_columns(at, count);
        }
    }

    pub fn remove_columns(&mut self, sheet: SheetId, at: u32, count: u32) {
        if let Some(sh) = self.memory_sheet_mut(sheet) {
            sh.remove_columns(at, count);
        }
    }

    /// Cuts the values in `source` and pastes them over `dest`.
    pub fn move_range(&mut self, source: &Area, dest: &Area) {
        let moved = match self.memory_sheet_mut(source.sheet) {
            Some(sh) => sh.take_area(source),
            None => return,
        };
        let Some(target) = self.memory_sheet_mut(dest.sheet) else {
            return;
        };
        target.take_area(dest);
        let dr = dest.top as i64 - source.top as i64;
        let dc = dest.left as i64 - source.left as i64;
        for ((r, c), v) in moved {
            target.set((r as i64 + dr) as u32, (c as i64 + dc) as u32, v);
        }
    }
}

impl Workbook for MemoryWorkbook {
    fn sheet(&self, id: SheetId) -> Option<&dyn Sheet> {
        self.memory_sheet(id).map(|s| s as &dyn Sheet)
    }

    fn sheet_mut(&mut self, id: SheetId) -> Option<&mut dyn Sheet> {
        self.memory_sheet_mut(id).map(|s| s as &mut dyn Sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_helpers_move_values() {
        let mut wb = MemoryWorkbook::new().with_sheet("Sheet1");
        let s = wb.sheet_id("sheet1").unwrap();
        wb = wb
            .with_cell(s, 1, 1, V::Int(1))
            .with_cell(s, 3, 1, V::Int(3))
            .with_cell(s, 5, 2, V::Int(5));
        wb.insert_rows(s, 2, 2);
        let sh = wb.sheet(s).unwrap();
        assert_eq!(sh.get(1, 1), V::Int(1));
        assert_eq!(sh.get(5, 1), V::Int(3));
        assert_eq!(sh.row_count(), 7);

        wb.remove_rows(s, 4, 2);
        assert_eq!(wb.sheet(s).unwrap().get(5, 1), V::Empty);
        assert_eq!(wb.sheet(s).unwrap().get(5, 2), V::Int(5));

        wb.move_range(&Area::new(s, 1, 1, 1, 1), &Area::new(s, 10, 3, 10, 3));
        assert_eq!(wb.sheet(s).unwrap().get(1, 1), V::Empty);
        assert_eq!(wb.sheet(s).unwrap().get(10, 3), V::Int(1));
    }
}
