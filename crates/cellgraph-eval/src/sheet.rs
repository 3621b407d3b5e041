//! Sheet storage seam.
//!
//! The engine never owns cell storage; it reads and writes through these
//! traits. [`crate::test_workbook::MemoryWorkbook`] is the in-memory
//! implementation used by tests and small hosts.

use std::collections::HashMap;

use cellgraph_common::{LiteralValue, SheetId};

pub trait Sheet {
    fn name(&self) -> &str;
    fn row_count(&self) -> u32;
    fn column_count(&self) -> u32;
    /// 1-based; cells never written read as `Empty`.
    fn get(&self, row: u32, col: u32) -> LiteralValue;
    fn set(&mut self, row: u32, col: u32, value: LiteralValue);
}

pub trait Workbook {
    fn sheet(&self, id: SheetId) -> Option<&dyn Sheet>;
    fn sheet_mut(&mut self, id: SheetId) -> Option<&mut dyn Sheet>;
}

/// Name ↔ id mapping. Lookup by name ignores ASCII case; the first spelling
/// registered is the one displayed.
#[derive(Default, Debug, Clone)]
pub struct SheetRegistry {
    id_by_name: HashMap<String, SheetId>,
    name_by_id: Vec<String>,
}

impl SheetRegistry {
    pub fn new() -> Self {
        SheetRegistry::default()
    }

    pub fn id_for(&mut self, name: &str) -> SheetId {
        let key = name.to_ascii_uppercase();
        if let Some(&id) = self.id_by_name.get(&key) {
            return id;
        }

        let id = self.name_by_id.len() as SheetId;
        self.name_by_id.push(name.to_string());
        self.id_by_name.insert(key, id);
        id
    }

    pub fn name(&self, id: SheetId) -> Option<&str> {
        self.name_by_id.get(id as usize).map(String::as_str)
    }

    pub fn get_id(&self, name: &str) -> Option<SheetId> {
        self.id_by_name.get(&name.to_ascii_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.name_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_by_id.is_empty()
    }
}
