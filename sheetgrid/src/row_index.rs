//! Dense-position index over a sheet's sparse row keys.

use crate::SheetError;
use crate::model::{DecodedRow, RowKey, SheetMeta, SheetVariant};
use crate::source::RowSource;
use tracing::debug;

/// Ordered mapping from dense position to sparse [`RowKey`].
///
/// Built once per sheet open by walking pages in source order, rows within a
/// page in stored order. No sorting, no deduplication: physical order is
/// authoritative and may be non-monotonic in logical id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowIndex {
    keys: Vec<RowKey>,
}

impl RowIndex {
    /// Expand `meta.pages` into dense positions.
    ///
    /// On subrow sheets a logical row with `subrows` of `k > 1` contributes
    /// `k` consecutive positions keyed `(id, 0)..(id, k - 1)`; a count of 1
    /// keys as `(id, None)` and a count of 0 contributes nothing.
    #[must_use]
    pub fn build(meta: &SheetMeta) -> Self {
        // row_count is advisory, good enough as a capacity hint.
        let mut keys = Vec::with_capacity(meta.row_count as usize);
        for page in &meta.pages {
            for row in &page.rows {
                match meta.variant {
                    SheetVariant::Subrows => match row.subrows {
                        0 => {}
                        1 => keys.push(RowKey::new(row.row_id)),
                        subrows => {
                            for sub_id in 0..subrows {
                                keys.push(RowKey::with_sub(row.row_id, sub_id));
                            }
                        }
                    },
                    SheetVariant::Default => keys.push(RowKey::new(row.row_id)),
                }
            }
        }
        Self { keys }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key at `position`, or `None` past the end.
    #[must_use]
    pub fn key_at(&self, position: usize) -> Option<RowKey> {
        self.keys.get(position).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = RowKey> + '_ {
        self.keys.iter().copied()
    }
}

/// Resolve `position` through `index` and decode the row from `rows`.
///
/// `Ok(None)` is the blank-row case: either the key's logical id sits outside
/// every declared page range, or the row source has no row for the key. Both
/// are tolerated inconsistencies, logged and counted by the caller, never a
/// draw failure. Positions at or past the index length are a caller error.
pub fn resolve(
    meta: &SheetMeta,
    index: &RowIndex,
    rows: &dyn RowSource,
    position: usize,
) -> Result<Option<DecodedRow>, SheetError> {
    let Some(key) = index.key_at(position) else {
        return Err(SheetError::PositionOutOfRange {
            position,
            len: index.len(),
        });
    };

    // Linear probe, page lists are short.
    if !meta.pages.iter().any(|page| page.covers(key.row_id)) {
        debug!("Row id {} of '{}' outside every page range", key.row_id, meta.name);
        return Ok(None);
    }

    let decoded = rows.decode(key);
    if decoded.is_none() {
        debug!("Row {key} missing from source for '{}'", meta.name);
    }
    Ok(decoded)
}
