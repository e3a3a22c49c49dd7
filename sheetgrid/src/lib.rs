#![deny(unused_crate_dependencies)]

pub mod async_util;
pub mod filter;
pub mod logs;
pub mod model;
pub mod row_index;
pub mod scroll;
pub mod sheet_list;
pub mod source;
#[cfg(test)]
pub mod tests;
pub mod view;
pub mod viewport;

use thiserror::Error;

pub use filter::{
    FilterTask, FilterUpdate, PredicateError, RowPredicate, TEXT_FILTER_INLINE_MAX, TextFilter,
    fuzzy_match,
};
pub use model::{
    CellValue, ColumnKind, ColumnMeta, DecodedRow, Locale, PageMeta, RowKey, SheetMeta,
    SheetVariant, StoredRow, TextFilterSpec, TextMatchMode,
};
pub use row_index::{RowIndex, resolve};
pub use scroll::{SCROLL_SETTLE_PASSES, ScrollCoordinator};
pub use sheet_list::{SheetContentScan, SheetNameFilter, SheetNameFilterKind};
pub use source::{MemoryTableSource, OpenSheet, RowSource, TableSource, seeded_sheet};
pub use view::SheetViewState;
pub use viewport::{CellPainter, DEFAULT_ROW_HEIGHT, RowViewport};

/// Failures surfaced to the embedding UI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetError {
    /// The table source knows no sheet by this name for the asked locale.
    #[error("no sheet named '{name}'")]
    SheetNotFound { name: String },

    /// A dense position at or past the end of the row index.
    #[error("position {position} out of range for index of length {len}")]
    PositionOutOfRange { position: usize, len: usize },

    /// A regex filter pattern that did not compile. Raised before any scan
    /// starts.
    #[error("invalid filter pattern '{pattern}': {reason}")]
    InvalidFilter { pattern: String, reason: String },

    /// First row a custom predicate failed on. The scan continues past
    /// failing rows; only the first failure is kept for display.
    #[error("predicate failed at position {position}: {reason}")]
    Predicate { position: usize, reason: String },

    /// The scan observed its cancel flag and stopped.
    #[error("scan cancelled")]
    Cancelled,
}
