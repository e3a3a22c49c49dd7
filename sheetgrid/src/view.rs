//! Per-view glue: one open sheet, its filter task, scroll state and the
//! windowed draw pass.

use std::sync::Arc;

use tracing::{debug, info};

use crate::SheetError;
use crate::filter::{FilterTask, RowPredicate};
use crate::model::{DecodedRow, Locale, SheetMeta, TextFilterSpec};
use crate::row_index::{RowIndex, resolve};
use crate::scroll::ScrollCoordinator;
use crate::source::{RowSource, TableSource};
use crate::viewport::{CellPainter, RowViewport};

struct OpenSheetState {
    meta: Arc<SheetMeta>,
    rows: Arc<dyn RowSource>,
    index: Arc<RowIndex>,
}

/// View state over one table source: the open sheet, the active filter and
/// the scroll machinery, driven by the embedding UI once per draw pass.
pub struct SheetViewState {
    source: Arc<dyn TableSource>,
    locale: Locale,
    sheet: Option<OpenSheetState>,
    filter_spec: TextFilterSpec,
    filter: Option<FilterTask>,
    last_error: Option<SheetError>,
    pub viewport: RowViewport,
    pub scroll: ScrollCoordinator,
}

impl SheetViewState {
    #[must_use]
    pub fn new(source: Arc<dyn TableSource>, locale: Locale) -> Self {
        Self {
            source,
            locale,
            sheet: None,
            filter_spec: TextFilterSpec::default(),
            filter: None,
            last_error: None,
            viewport: RowViewport::new(),
            scroll: ScrollCoordinator::new(),
        }
    }

    /// Open `name` under the current locale, replacing any open sheet.
    ///
    /// Resets the filter, the height estimate and any pending scroll. On
    /// failure the previous sheet stays open untouched.
    pub fn open_sheet(&mut self, name: &str) -> Result<(), SheetError> {
        let Some(sheet) = self.source.open(name, &self.locale) else {
            return Err(SheetError::SheetNotFound {
                name: name.to_string(),
            });
        };

        self.abort_filter();
        let index = Arc::new(RowIndex::build(&sheet.meta));
        info!("Opened sheet '{name}' with {} positions", index.len());
        self.sheet = Some(OpenSheetState {
            meta: sheet.meta,
            rows: sheet.rows,
            index,
        });
        self.filter_spec.text.clear();
        self.last_error = None;
        self.viewport.reset();
        self.scroll.clear();
        Ok(())
    }

    /// Switch locale and re-open the current sheet under it. The sheet is
    /// rebuilt from scratch; cell data is never patched in place. If the
    /// sheet does not open under the new locale, the locale reverts and the
    /// old sheet stays.
    pub fn set_locale(&mut self, locale: Locale) -> Result<(), SheetError> {
        if self.locale == locale {
            return Ok(());
        }
        info!("Switching locale to {locale}");
        let previous = std::mem::replace(&mut self.locale, locale);
        if let Some(name) = self.sheet_name().map(String::from)
            && let Err(err) = self.open_sheet(&name)
        {
            self.locale = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Replace the text filter. A non-empty text starts a fresh scan; empty
    /// text clears the filter and forgets the learned row height. The height
    /// estimate survives non-empty filter changes.
    pub fn set_filter_text(&mut self, spec: TextFilterSpec) {
        self.abort_filter();
        self.last_error = None;
        self.filter_spec = spec;

        if self.filter_spec.text.is_empty() {
            self.viewport.reset();
            return;
        }

        let Some(sheet) = self.sheet.as_ref() else {
            debug!("Filter text set with no sheet open");
            return;
        };
        match FilterTask::start_text(
            sheet.meta.clone(),
            sheet.index.clone(),
            sheet.rows.clone(),
            &self.filter_spec,
        ) {
            Ok(task) => self.filter = Some(task),
            Err(err) => {
                debug!("Filter '{}' rejected: {err}", self.filter_spec.text);
                self.last_error = Some(err);
            }
        }
    }

    /// Replace the filter with a custom row predicate, scanned on a worker.
    pub fn set_predicate(&mut self, predicate: RowPredicate) {
        self.abort_filter();
        self.last_error = None;

        let Some(sheet) = self.sheet.as_ref() else {
            debug!("Predicate set with no sheet open");
            return;
        };
        self.filter = Some(FilterTask::start_custom(
            sheet.meta.clone(),
            sheet.index.clone(),
            sheet.rows.clone(),
            predicate,
        ));
    }

    /// Drop the filter entirely and show the full index again.
    pub fn clear_filter(&mut self) {
        self.abort_filter();
        self.filter_spec.text.clear();
        self.last_error = None;
        self.viewport.reset();
    }

    /// Stop the in-flight scan but keep its partial matches as the visible
    /// list. Also discards any pending error message.
    pub fn cancel_filter(&mut self) {
        if let Some(task) = self.filter.as_ref() {
            task.cancel();
        }
        self.last_error = None;
    }

    fn abort_filter(&mut self) {
        if let Some(task) = self.filter.take() {
            task.cancel();
        }
    }

    /// Queue a deferred jump to `position` in the effective row list.
    pub fn request_scroll(&mut self, position: usize) {
        self.scroll.request(position);
    }

    /// Run one draw pass: drain filter progress, apply any pending scroll
    /// and paint the visible window through `painter`.
    ///
    /// `scroll_offset` is where the embedding scroll area currently sits;
    /// the return value is the offset to force instead while a scroll
    /// request is settling, `None` otherwise. Filter results are snapshot
    /// once at the top, so the list cannot shift mid-pass.
    pub fn draw(
        &mut self,
        painter: &mut dyn CellPainter,
        scroll_offset: f32,
        view_height: f32,
    ) -> Option<f32> {
        if let Some(task) = self.filter.as_mut() {
            task.poll();
            if self.last_error.is_none()
                && let Some(err) = task.error()
            {
                self.last_error = Some(err.clone());
            }
        }

        let corrected = self.scroll.on_draw(self.viewport.row_height());
        let offset = corrected.unwrap_or(scroll_offset);

        let Some(sheet) = self.sheet.as_ref() else {
            return corrected;
        };

        let total = match self.filter.as_ref() {
            Some(task) => task.matched().len(),
            None => sheet.index.len(),
        };
        let range = self.viewport.visible_range(offset, view_height, total);

        for list_index in range {
            let position = match self.filter.as_ref() {
                Some(task) => task.matched()[list_index],
                None => list_index,
            };
            let row = resolve(&sheet.meta, &sheet.index, sheet.rows.as_ref(), position)
                .ok()
                .flatten();
            self.viewport
                .paint_row(painter, position, &sheet.meta.columns, row.as_ref());
        }

        corrected
    }

    /// Decode the row at dense `position` regardless of the active filter.
    pub fn resolve_position(&self, position: usize) -> Result<Option<DecodedRow>, SheetError> {
        let Some(sheet) = self.sheet.as_ref() else {
            return Err(SheetError::PositionOutOfRange { position, len: 0 });
        };
        resolve(&sheet.meta, &sheet.index, sheet.rows.as_ref(), position)
    }

    /// Rows the view currently shows: matched rows under a filter, the whole
    /// index otherwise, zero with no sheet open.
    #[must_use]
    pub fn effective_len(&self) -> usize {
        match (&self.filter, &self.sheet) {
            (Some(task), Some(_)) => task.matched().len(),
            (None, Some(sheet)) => sheet.index.len(),
            _ => 0,
        }
    }

    /// Matched dense positions while a filter exists, `None` otherwise.
    #[must_use]
    pub fn filtered_positions(&self) -> Option<&[usize]> {
        self.filter.as_ref().map(FilterTask::matched)
    }

    #[must_use]
    pub fn filter_in_progress(&self) -> bool {
        self.filter
            .as_ref()
            .is_some_and(|task| !task.is_complete() && !task.cancelled())
    }

    /// Message for the most recent filter failure, shown until the next
    /// filter change or cancellation replaces it.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.last_error.as_ref().map(ToString::to_string)
    }

    #[must_use]
    pub fn meta(&self) -> Option<&SheetMeta> {
        self.sheet.as_ref().map(|sheet| sheet.meta.as_ref())
    }

    #[must_use]
    pub fn sheet_name(&self) -> Option<&str> {
        self.sheet.as_ref().map(|sheet| sheet.meta.name.as_str())
    }

    #[must_use]
    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    #[must_use]
    pub fn filter_spec(&self) -> &TextFilterSpec {
        &self.filter_spec
    }
}
