use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::filter::FilterTask;
use crate::model::{
    CellValue, ColumnKind, ColumnMeta, Locale, PageMeta, RowKey, SheetMeta, SheetVariant,
    StoredRow,
};
use crate::sheet_list::SheetContentScan;
use crate::source::MemoryTableSource;
use crate::viewport::CellPainter;

pub(crate) fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("runtime")
}

pub(crate) fn en() -> Locale {
    Locale::new("en")
}

pub(crate) fn wait_for_filter_complete(task: &mut FilterTask) {
    let start = Instant::now();
    loop {
        task.poll();
        if task.is_complete() {
            break;
        }
        if start.elapsed().as_secs() > 10 {
            panic!("timed out waiting for filter scan");
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}

pub(crate) fn wait_for_scan_complete(scan: &mut SheetContentScan) {
    let start = Instant::now();
    loop {
        scan.poll();
        if scan.is_complete() {
            break;
        }
        if start.elapsed().as_secs() > 10 {
            panic!("timed out waiting for sheet content scan");
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}

fn two_columns() -> Vec<ColumnMeta> {
    vec![
        ColumnMeta {
            offset: 0,
            kind: ColumnKind::Text,
        },
        ColumnMeta {
            offset: 4,
            kind: ColumnKind::UInt,
        },
    ]
}

fn row_cells(name: &str, key: RowKey) -> Vec<Option<CellValue>> {
    vec![
        Some(CellValue::Text(format!("{name} row {key}"))),
        Some(CellValue::UInt(u64::from(key.row_id) * 10)),
    ]
}

/// Sheet with one stored row per id and two columns (text, uint), all ids
/// covered by a single page.
pub(crate) fn plain_sheet(
    name: &str,
    row_ids: &[u32],
) -> (SheetMeta, Vec<(RowKey, Vec<Option<CellValue>>)>) {
    let start_id = row_ids.iter().min().copied().unwrap_or(0);
    let end_id = row_ids.iter().max().copied().unwrap_or(0);
    let meta = SheetMeta {
        name: name.to_string(),
        variant: SheetVariant::Default,
        row_count: row_ids.len() as u32,
        columns: two_columns(),
        pages: vec![PageMeta {
            start_id,
            row_span: end_id - start_id + 1,
            rows: row_ids
                .iter()
                .map(|&row_id| StoredRow { row_id, subrows: 1 })
                .collect(),
        }],
    };
    let cells = row_ids
        .iter()
        .map(|&row_id| (RowKey::new(row_id), row_cells(name, RowKey::new(row_id))))
        .collect();
    (meta, cells)
}

/// Subrow-variant sheet from `(row_id, subrow_count)` pairs.
pub(crate) fn subrow_sheet(
    name: &str,
    rows: &[(u32, u16)],
) -> (SheetMeta, Vec<(RowKey, Vec<Option<CellValue>>)>) {
    let start_id = rows.iter().map(|&(id, _)| id).min().unwrap_or(0);
    let end_id = rows.iter().map(|&(id, _)| id).max().unwrap_or(0);
    let meta = SheetMeta {
        name: name.to_string(),
        variant: SheetVariant::Subrows,
        row_count: rows.len() as u32,
        columns: two_columns(),
        pages: vec![PageMeta {
            start_id,
            row_span: end_id - start_id + 1,
            rows: rows
                .iter()
                .map(|&(row_id, subrows)| StoredRow { row_id, subrows })
                .collect(),
        }],
    };
    let mut cells = Vec::new();
    for &(row_id, subrows) in rows {
        match subrows {
            0 => {}
            1 => cells.push((RowKey::new(row_id), row_cells(name, RowKey::new(row_id)))),
            subrows => {
                for sub_id in 0..subrows {
                    let key = RowKey::with_sub(row_id, sub_id);
                    cells.push((key, row_cells(name, key)));
                }
            }
        }
    }
    (meta, cells)
}

/// Sheet with deliberate inconsistencies: the page declares ids 0..5 but
/// stores a row with id 7 (uncovered) and carries no cell data for id 2
/// (missing). Positions 2 and 3 resolve blank.
pub(crate) fn gapped_sheet(name: &str) -> (SheetMeta, Vec<(RowKey, Vec<Option<CellValue>>)>) {
    let meta = SheetMeta {
        name: name.to_string(),
        variant: SheetVariant::Default,
        row_count: 4,
        columns: two_columns(),
        pages: vec![PageMeta {
            start_id: 0,
            row_span: 5,
            rows: [0, 1, 2, 7]
                .into_iter()
                .map(|row_id| StoredRow { row_id, subrows: 1 })
                .collect(),
        }],
    };
    // Id 7 gets cells on purpose; the page range, not storage, blanks it.
    let cells = [0, 1, 7]
        .into_iter()
        .map(|row_id| (RowKey::new(row_id), row_cells(name, RowKey::new(row_id))))
        .collect();
    (meta, cells)
}

pub(crate) fn memory_source(
    sheets: Vec<(SheetMeta, Vec<(RowKey, Vec<Option<CellValue>>)>)>,
) -> Arc<MemoryTableSource> {
    let mut source = MemoryTableSource::new();
    for (meta, rows) in sheets {
        source.insert(en(), meta, rows);
    }
    Arc::new(source)
}

pub(crate) struct PaintedCell {
    pub position: usize,
    pub column: usize,
    pub kind: ColumnKind,
    pub text: Option<String>,
}

/// Cell painter that records every call and answers with a fixed height,
/// overridable per position to provoke height drift.
pub(crate) struct RecordingPainter {
    pub cells: Vec<PaintedCell>,
    pub spacers: Vec<f32>,
    cell_height: f32,
    tall_rows: HashMap<usize, f32>,
}

impl RecordingPainter {
    pub(crate) fn new(cell_height: f32) -> Self {
        Self {
            cells: Vec::new(),
            spacers: Vec::new(),
            cell_height,
            tall_rows: HashMap::new(),
        }
    }

    pub(crate) fn with_tall_row(mut self, position: usize, height: f32) -> Self {
        self.tall_rows.insert(position, height);
        self
    }

    /// Positions in paint order, one entry per painted row.
    pub(crate) fn painted_positions(&self) -> Vec<usize> {
        self.cells
            .iter()
            .filter(|cell| cell.column == 0)
            .map(|cell| cell.position)
            .collect()
    }

    pub(crate) fn column_texts(&self, column: usize) -> Vec<Option<String>> {
        self.cells
            .iter()
            .filter(|cell| cell.column == column)
            .map(|cell| cell.text.clone())
            .collect()
    }
}

impl CellPainter for RecordingPainter {
    fn draw_cell(
        &mut self,
        position: usize,
        column: usize,
        kind: ColumnKind,
        value: Option<&CellValue>,
    ) -> f32 {
        self.cells.push(PaintedCell {
            position,
            column,
            kind,
            text: value.map(ToString::to_string),
        });
        self.tall_rows
            .get(&position)
            .copied()
            .unwrap_or(self.cell_height)
    }

    fn draw_spacer(&mut self, height: f32) {
        self.spacers.push(height);
    }
}
