use std::sync::atomic::{AtomicU64, Ordering};

use cellgraph_common::{GridBounds, SheetId, letters_to_col};

use super::{BandRef, CellRangeRef, CellRef, ExternalId, GridPoint, NameRef, Reference, ReferenceKind};
use crate::EngineError;
use crate::sheet::SheetRegistry;

static NEXT_EXTERNAL: AtomicU64 = AtomicU64::new(1);

/// Builds bounds-checked references and parses A1 text into them.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceFactory {
    bounds: GridBounds,
}

impl ReferenceFactory {
    pub fn new(bounds: GridBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &GridBounds {
        &self.bounds
    }

    pub fn cell(&self, sheet: SheetId, row: u32, col: u32) -> Result<Reference, EngineError> {
        self.bounds.check(row, col)?;
        Ok(Reference::from_kind(ReferenceKind::Cell(CellRef { sheet, row, col })))
    }

    pub fn range(
        &self,
        sheet: SheetId,
        row1: u32,
        col1: u32,
        row2: u32,
        col2: u32,
    ) -> Result<Reference, EngineError> {
        self.bounds.check(row1, col1)?;
        self.bounds.check(row2, col2)?;
        Ok(Reference::from_kind(ReferenceKind::CellRange(CellRangeRef {
            sheet,
            start: GridPoint::new(row1.min(row2), col1.min(col2)),
            finish: GridPoint::new(row1.max(row2), col1.max(col2)),
        })))
    }

    pub fn rows(&self, sheet: SheetId, start: u32, finish: u32) -> Result<Reference, EngineError> {
        self.bounds.check_row(start)?;
        self.bounds.check_row(finish)?;
        Ok(Reference::from_kind(ReferenceKind::RowRange(BandRef {
            sheet,
            start: start.min(finish),
            finish: start.max(finish),
        })))
    }

    pub fn columns(&self, sheet: SheetId, start: u32, finish: u32) -> Result<Reference, EngineError> {
        self.bounds.check_column(start)?;
        self.bounds.check_column(finish)?;
        Ok(Reference::from_kind(ReferenceKind::ColumnRange(BandRef {
            sheet,
            start: start.min(finish),
            finish: start.max(finish),
        })))
    }

    pub fn named(&self, name: &str) -> Result<Reference, EngineError> {
        if !is_name(name) {
            return Err(EngineError::Parse(format!("'{name}' is not a valid name")));
        }
        Ok(Reference::from_kind(ReferenceKind::Named(NameRef::new(name))))
    }

    /// A fresh external binding, unequal to every other one.
    pub fn external(&self) -> Reference {
        let id = NEXT_EXTERNAL.fetch_add(1, Ordering::Relaxed);
        Reference::from_kind(ReferenceKind::External(ExternalId(id)))
    }

    pub fn volatile(&self) -> Reference {
        Reference::volatile()
    }

    /// Parses `A1`, `$B$2`, `A1:C3`, `3:5`, `B:D`, or a name, optionally
    /// prefixed with `Sheet!` or `'Quoted Sheet'!`.
    pub fn parse(
        &self,
        text: &str,
        default_sheet: SheetId,
        sheets: &SheetRegistry,
    ) -> Result<Reference, EngineError> {
        let text = text.trim();
        let (sheet, body) = match split_sheet(text)? {
            Some((name, body)) => {
                let id = sheets
                    .get_id(&name)
                    .ok_or_else(|| EngineError::Parse(format!("unknown sheet '{name}'")))?;
                (Some(id), body)
            }
            None => (None, text),
        };
        let on = sheet.unwrap_or(default_sheet);
        let stripped: String = body.chars().filter(|&c| c != '$').collect();

        if let Some((a, b)) = stripped.split_once(':') {
            if let (Some((r1, c1)), Some((r2, c2))) = (parse_cell(a), parse_cell(b)) {
                return self.range(on, r1, c1, r2, c2);
            }
            if let (Ok(r1), Ok(r2)) = (a.parse::<u32>(), b.parse::<u32>()) {
                return self.rows(on, r1, r2);
            }
            if let (Some(c1), Some(c2)) = (letters_to_col(a), letters_to_col(b)) {
                return self.columns(on, c1, c2);
            }
            return Err(EngineError::Parse(format!("'{text}' is not a reference")));
        }
        if let Some((row, col)) = parse_cell(&stripped) {
            return self.cell(on, row, col);
        }
        if sheet.is_some() || stripped.len() != body.len() {
            return Err(EngineError::Parse(format!("'{text}' is not a reference")));
        }
        self.named(body)
    }

    /// A1 text using the registry's sheet names.
    pub fn format(&self, reference: &Reference, sheets: &SheetRegistry) -> String {
        reference.to_a1(|id| sheets.name(id).map(str::to_string))
    }
}

fn split_sheet(text: &str) -> Result<Option<(String, &str)>, EngineError> {
    if let Some(rest) = text.strip_prefix('\'') {
        let mut name = String::new();
        let mut chars = rest.char_indices();
        while let Some((i, c)) = chars.next() {
            if c != '\'' {
                name.push(c);
                continue;
            }
            if rest[i + 1..].starts_with('\'') {
                name.push('\'');
                chars.next();
                continue;
            }
            return match rest[i + 1..].strip_prefix('!') {
                Some(body) => Ok(Some((name, body))),
                None => Err(EngineError::Parse(format!("expected '!' after sheet in '{text}'"))),
            };
        }
        return Err(EngineError::Parse(format!("unterminated sheet name in '{text}'")));
    }
    Ok(text
        .rsplit_once('!')
        .map(|(name, body)| (name.to_string(), body)))
}

fn parse_cell(s: &str) -> Option<(u32, u32)> {
    let split = s.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = s.split_at(split);
    let col = letters_to_col(letters)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let row = digits.parse().ok()?;
    Some((row, col))
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}
