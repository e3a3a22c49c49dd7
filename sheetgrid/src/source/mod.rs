//! Collaborator traits a table backend implements, plus the in-memory source
//! used by tests and demos.

pub mod memory;

pub use memory::{MemoryTableSource, seeded_sheet};

use crate::model::{DecodedRow, Locale, RowKey, SheetMeta};
use std::sync::Arc;

/// Decodes stored rows of one open sheet.
///
/// Shared with background filter scans, so implementations are called from
/// worker threads concurrently with the render thread.
pub trait RowSource: Send + Sync {
    /// Decoded column values for `key`, or `None` if the backing data has no
    /// such row. Absent rows are not an error; they render blank.
    fn decode(&self, key: RowKey) -> Option<DecodedRow>;
}

/// Hands out sheets by name and locale.
pub trait TableSource: Send + Sync {
    /// Names of all sheets this source can open, in source order.
    fn sheet_names(&self) -> Vec<String>;

    /// Open `name` for `locale`, or `None` if the source knows no such sheet.
    fn open(&self, name: &str, locale: &Locale) -> Option<OpenSheet>;
}

/// Sheet handle returned by [`TableSource::open`].
pub struct OpenSheet {
    pub meta: Arc<SheetMeta>,
    pub rows: Arc<dyn RowSource>,
}
