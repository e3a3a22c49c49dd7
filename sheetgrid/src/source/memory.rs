use crate::model::{
    CellValue, ColumnKind, ColumnMeta, DecodedRow, Locale, PageMeta, RowKey, SheetMeta,
    SheetVariant, StoredRow,
};
use crate::source::{OpenSheet, RowSource, TableSource};
use std::collections::HashMap;
use std::sync::Arc;

/// Row storage of one registered sheet.
pub struct MemoryRowSource {
    cells: HashMap<RowKey, Vec<Option<CellValue>>>,
}

impl RowSource for MemoryRowSource {
    fn decode(&self, key: RowKey) -> Option<DecodedRow> {
        self.cells.get(&key).map(|cells| DecodedRow {
            key,
            cells: cells.clone(),
        })
    }
}

/// In-memory table source.
///
/// Sheets are registered per locale before the source is shared out; the name
/// listing keeps registration order.
#[derive(Default)]
pub struct MemoryTableSource {
    names: Vec<String>,
    sheets: HashMap<(Locale, String), (Arc<SheetMeta>, Arc<MemoryRowSource>)>,
}

impl MemoryTableSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `meta` and its row cells under `locale`. Replaces any earlier
    /// registration of the same sheet and locale.
    pub fn insert(
        &mut self,
        locale: Locale,
        meta: SheetMeta,
        rows: Vec<(RowKey, Vec<Option<CellValue>>)>,
    ) {
        if !self.names.contains(&meta.name) {
            self.names.push(meta.name.clone());
        }
        let cells = rows.into_iter().collect();
        self.sheets.insert(
            (locale, meta.name.clone()),
            (Arc::new(meta), Arc::new(MemoryRowSource { cells })),
        );
    }
}

impl TableSource for MemoryTableSource {
    fn sheet_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn open(&self, name: &str, locale: &Locale) -> Option<OpenSheet> {
        let (meta, rows) = self.sheets.get(&(locale.clone(), name.to_string()))?;
        Some(OpenSheet {
            meta: meta.clone(),
            rows: rows.clone(),
        })
    }
}

/// Build a deterministic `rows` x `columns` sheet for demos and tests.
///
/// Column kinds cycle through the five cell types and every 7th cell is left
/// absent so blank-cell paths get exercised.
#[must_use]
pub fn seeded_sheet(
    name: &str,
    rows: u32,
    columns: u16,
    seed: u64,
) -> (SheetMeta, Vec<(RowKey, Vec<Option<CellValue>>)>) {
    let mut rng = fastrand::Rng::with_seed(seed);
    let kinds = [
        ColumnKind::Text,
        ColumnKind::UInt,
        ColumnKind::Int,
        ColumnKind::Float,
        ColumnKind::Bool,
    ];

    let columns: Vec<ColumnMeta> = (0..columns)
        .map(|column| ColumnMeta {
            offset: column * 4,
            kind: kinds[usize::from(column) % kinds.len()],
        })
        .collect();

    let stored = (0..rows)
        .map(|row_id| StoredRow {
            row_id,
            subrows: 1,
        })
        .collect();
    let meta = SheetMeta {
        name: name.to_string(),
        variant: SheetVariant::Default,
        row_count: rows,
        columns,
        pages: vec![PageMeta {
            start_id: 0,
            row_span: rows,
            rows: stored,
        }],
    };

    let cells = (0..rows)
        .map(|row_id| {
            let values = meta
                .columns
                .iter()
                .enumerate()
                .map(|(column, column_meta)| {
                    if (row_id as usize + column) % 7 == 6 {
                        return None;
                    }
                    Some(match column_meta.kind {
                        ColumnKind::Text => {
                            CellValue::Text(format!("{name} {row_id}-{column} {}", rng.u32(..)))
                        }
                        ColumnKind::Bool => CellValue::Bool(rng.bool()),
                        ColumnKind::Int => CellValue::Int(rng.i64(-1000..1000)),
                        ColumnKind::UInt => CellValue::UInt(rng.u64(..10_000)),
                        ColumnKind::Float => CellValue::Float(rng.f64() * 100.0),
                    })
                })
                .collect();
            (RowKey::new(row_id), values)
        })
        .collect();

    (meta, cells)
}
