//! Windowed rendering over a row list: visible-range math, the cell painter
//! seam and the monotonic row-height estimate.

use std::ops::Range;

use tracing::trace;

use crate::model::{CellValue, ColumnKind, ColumnMeta, DecodedRow};

/// Row height assumed until a painted row measures taller.
pub const DEFAULT_ROW_HEIGHT: f32 = 20.0;

/// Receives cell draw calls for the visible window. Implementations report
/// the painted height of each cell so the viewport can track row heights.
pub trait CellPainter {
    /// Draw one cell and return its painted height. `value` is `None` for
    /// blank cells and for every cell of a dropped row.
    fn draw_cell(
        &mut self,
        position: usize,
        column: usize,
        kind: ColumnKind,
        value: Option<&CellValue>,
    ) -> f32;

    /// Pad below a row that painted shorter than the current row height.
    fn draw_spacer(&mut self, height: f32);
}

/// Visible-window state for one sheet view.
///
/// The height estimate only ever grows within a sheet: once some row paints
/// taller, every later offset computation uses the taller value. Rows that
/// paint shorter are padded with a spacer in the same pass, so the scroll
/// geometry never jumps backwards.
#[derive(Debug, Clone)]
pub struct RowViewport {
    height_estimate: Option<f32>,
    visible: Range<usize>,
    missing_rows: u64,
}

impl Default for RowViewport {
    fn default() -> Self {
        Self::new()
    }
}

impl RowViewport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            height_estimate: None,
            visible: 0..0,
            missing_rows: 0,
        }
    }

    /// Forget the learned height and the visible window. Called when a sheet
    /// opens and when the filter is cleared, never on a mere filter change.
    pub fn reset(&mut self) {
        self.height_estimate = None;
        self.visible = 0..0;
        self.missing_rows = 0;
    }

    /// Current per-row height: the learned estimate, or the default until a
    /// row has measured taller.
    #[must_use]
    pub fn row_height(&self) -> f32 {
        self.height_estimate.unwrap_or(DEFAULT_ROW_HEIGHT)
    }

    /// Compute and remember the list indices visible at `scroll_offset` in a
    /// view of `view_height` points, clamped to `total` rows. One extra row
    /// is included so a partially scrolled-in row still paints.
    pub fn visible_range(
        &mut self,
        scroll_offset: f32,
        view_height: f32,
        total: usize,
    ) -> Range<usize> {
        let row_height = self.row_height();
        let first = (scroll_offset / row_height).floor().max(0.0) as usize;
        let count = (view_height / row_height).ceil() as usize + 1;
        let first = first.min(total);
        let last = (first + count).min(total);
        self.visible = first..last;
        trace!("Visible rows {first}..{last} of {total}");
        self.visible.clone()
    }

    /// The range last returned by [`RowViewport::visible_range`].
    #[must_use]
    pub fn visible(&self) -> Range<usize> {
        self.visible.clone()
    }

    /// Paint one row through `painter`. A `None` row paints a full rank of
    /// blank cells and is counted, not skipped, so positions below it keep
    /// their offsets.
    pub fn paint_row(
        &mut self,
        painter: &mut dyn CellPainter,
        position: usize,
        columns: &[ColumnMeta],
        row: Option<&DecodedRow>,
    ) {
        let mut tallest: f32 = 0.0;
        for (column, meta) in columns.iter().enumerate() {
            let value = row.and_then(|row| row.cell(column));
            let height = painter.draw_cell(position, column, meta.kind, value);
            tallest = tallest.max(height);
        }
        if row.is_none() {
            self.missing_rows += 1;
        }

        let current = self.row_height();
        if tallest > current {
            self.height_estimate = Some(tallest);
        } else if tallest < current {
            painter.draw_spacer(current - tallest);
        }
    }

    /// Rows painted blank because their data never resolved.
    #[must_use]
    pub fn missing_rows(&self) -> u64 {
        self.missing_rows
    }
}
