use derive_more::Display;
use enum_iterator::Sequence;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Language tag the sheet contents were fetched for.
///
/// Sheets are immutable per locale; changing the locale re-opens the sheet
/// wholesale instead of patching cells in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub struct Locale(pub String);

impl Locale {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

/// Type tag of a column as declared by the sheet schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum ColumnKind {
    #[display("string")]
    Text,
    #[display("bool")]
    Bool,
    #[display("int")]
    Int,
    #[display("uint")]
    UInt,
    #[display("float")]
    Float,
}

/// Schema entry for a column: offset into the stored row plus its type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub offset: u16,
    pub kind: ColumnKind,
}

/// Whether logical rows of a sheet may carry multiple subrows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetVariant {
    Default,
    Subrows,
}

/// One stored row as delivered inside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    pub row_id: u32,
    /// Subrow count for `SheetVariant::Subrows` sheets; 1 everywhere else.
    pub subrows: u16,
}

/// Contiguous chunk of stored rows as delivered by the table source.
///
/// `start_id`/`row_span` is the id range the source declares for the page,
/// `rows` is what the page actually holds. The two are allowed to disagree;
/// rows outside every declared range resolve to blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub start_id: u32,
    pub row_span: u32,
    pub rows: Vec<StoredRow>,
}

impl PageMeta {
    /// True if `row_id` falls inside the declared id range.
    #[must_use]
    pub fn covers(&self, row_id: u32) -> bool {
        row_id >= self.start_id
            && u64::from(row_id) < u64::from(self.start_id) + u64::from(self.row_span)
    }
}

/// Immutable description of one sheet: schema, page layout, advisory counts.
///
/// `row_count` is whatever the source declares. The authoritative dense count
/// is the length of the row index built from `pages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetMeta {
    pub name: String,
    pub variant: SheetVariant,
    pub row_count: u32,
    pub columns: Vec<ColumnMeta>,
    pub pages: Vec<PageMeta>,
}

impl SheetMeta {
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Sparse identity of one visual row: logical row id plus optional subrow id.
///
/// `sub_id` is set only for logical rows that expand to more than one dense
/// position; single-subrow rows key as `(row_id, None)` even on subrow sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub row_id: u32,
    pub sub_id: Option<u16>,
}

impl RowKey {
    #[must_use]
    pub fn new(row_id: u32) -> Self {
        Self {
            row_id,
            sub_id: None,
        }
    }

    #[must_use]
    pub fn with_sub(row_id: u32, sub_id: u16) -> Self {
        Self {
            row_id,
            sub_id: Some(sub_id),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub_id {
            Some(sub_id) => write!(f, "{}.{}", self.row_id, sub_id),
            None => write!(f, "{}", self.row_id),
        }
    }
}

/// One decoded column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Text(String),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl CellValue {
    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        match self {
            CellValue::Text(_) => ColumnKind::Text,
            CellValue::Bool(_) => ColumnKind::Bool,
            CellValue::Int(_) => ColumnKind::Int,
            CellValue::UInt(_) => ColumnKind::UInt,
            CellValue::Float(_) => ColumnKind::Float,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(text) => f.write_str(text),
            CellValue::Bool(value) => write!(f, "{value}"),
            CellValue::Int(value) => write!(f, "{value}"),
            CellValue::UInt(value) => write!(f, "{value}"),
            CellValue::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Decoded column values for one visual row.
///
/// Built on demand and never cached across draw or filter passes; the row
/// source is assumed cheap enough to re-decode.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    pub key: RowKey,
    pub cells: Vec<Option<CellValue>>,
}

impl DecodedRow {
    /// Value in `column`, `None` for absent cells and columns past the end.
    #[must_use]
    pub fn cell(&self, column: usize) -> Option<&CellValue> {
        self.cells.get(column).and_then(Option::as_ref)
    }

    /// Space-joined text of all present cells, the haystack for text filters.
    #[must_use]
    pub fn display_text(&self) -> String {
        self.cells.iter().flatten().map(CellValue::to_string).join(" ")
    }
}

/// Search configuration for row-content filter operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextFilterSpec {
    pub mode: TextMatchMode,
    pub case_sensitive: bool,
    pub text: String,
}

impl TextFilterSpec {
    #[must_use]
    pub fn contains(text: impl Into<String>) -> Self {
        Self {
            mode: TextMatchMode::Contains,
            case_sensitive: false,
            text: text.into(),
        }
    }
}

impl Default for TextFilterSpec {
    fn default() -> Self {
        Self {
            mode: TextMatchMode::Contains,
            case_sensitive: false,
            text: String::new(),
        }
    }
}

/// Text match mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Sequence)]
pub enum TextMatchMode {
    Contains,
    Exact,
    Regex,
    Fuzzy,
}
