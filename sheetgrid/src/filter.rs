//! Incremental row filtering: compiled text matchers, user predicates and the
//! cancellable scan task feeding results back to the render thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use regex::RegexBuilder;
use thiserror::Error;
use tracing::debug;

use crate::SheetError;
use crate::async_util::perform_work;
use crate::model::{DecodedRow, SheetMeta, TextFilterSpec, TextMatchMode};
use crate::row_index::{RowIndex, resolve};
use crate::source::RowSource;

/// Text filters over sheets up to this many positions run to completion on
/// the render thread; larger sheets scan on a worker like custom predicates.
pub const TEXT_FILTER_INLINE_MAX: usize = 10_000;

/// Returns true if `needle` characters appear in `haystack` in order
/// (subsequence). "abc" matches "aXbYcZ" but not "bac".
#[must_use]
pub fn fuzzy_match(needle: &str, needle_lower: &str, haystack: &str, case_sensitive: bool) -> bool {
    if needle.is_empty() {
        return true;
    }

    let needle_chars: Vec<char> = if case_sensitive {
        needle.chars().collect()
    } else {
        needle_lower.chars().collect()
    };

    let haystack_lower;
    let haystack_chars: Box<dyn Iterator<Item = char>> = if case_sensitive {
        Box::new(haystack.chars())
    } else {
        haystack_lower = haystack.to_lowercase();
        Box::new(haystack_lower.chars())
    };

    let mut needle_idx = 0;
    for hay_char in haystack_chars {
        if needle_idx < needle_chars.len() && hay_char == needle_chars[needle_idx] {
            needle_idx += 1;
        }
    }

    needle_idx == needle_chars.len()
}

/// Compiled matcher for one [`TextFilterSpec`].
#[derive(Debug, Clone)]
pub struct TextFilter {
    mode: TextMatchMode,
    case_sensitive: bool,
    text: String,
    text_lower: String,
    regex: Option<regex::Regex>,
}

impl TextFilter {
    /// Compile `spec`. A regex spec with a bad pattern fails here, before any
    /// scan starts.
    pub fn new(spec: &TextFilterSpec) -> Result<Self, SheetError> {
        let text = spec.text.clone();
        let text_lower = text.to_lowercase();
        let regex = match spec.mode {
            TextMatchMode::Regex if !text.is_empty() => {
                let built = RegexBuilder::new(&text)
                    .case_insensitive(!spec.case_sensitive)
                    .build()
                    .map_err(|err| SheetError::InvalidFilter {
                        pattern: text.clone(),
                        reason: err.to_string(),
                    })?;
                Some(built)
            }
            _ => None,
        };

        Ok(Self {
            mode: spec.mode,
            case_sensitive: spec.case_sensitive,
            text,
            text_lower,
            regex,
        })
    }

    /// An empty filter text matches everything.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.text.is_empty()
    }

    #[must_use]
    pub fn matches(&self, haystack: &str) -> bool {
        if !self.is_active() {
            return true;
        }

        match self.mode {
            TextMatchMode::Contains => {
                if self.case_sensitive {
                    haystack.contains(&self.text)
                } else {
                    haystack.to_lowercase().contains(&self.text_lower)
                }
            }
            TextMatchMode::Exact => {
                if self.case_sensitive {
                    haystack == self.text
                } else {
                    haystack.to_lowercase() == self.text_lower
                }
            }
            TextMatchMode::Regex => self
                .regex
                .as_ref()
                .is_some_and(|regex| regex.is_match(haystack)),
            TextMatchMode::Fuzzy => {
                fuzzy_match(&self.text, &self.text_lower, haystack, self.case_sensitive)
            }
        }
    }
}

/// Failure raised by a row predicate for one row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PredicateError(pub String);

impl PredicateError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// User-supplied predicate over decoded rows; errors are per-row values,
/// never unwinding.
pub type RowPredicate = Arc<dyn Fn(&DecodedRow) -> Result<bool, PredicateError> + Send + Sync>;

enum CompiledPredicate {
    Text(TextFilter),
    Custom(RowPredicate),
}

/// Progress reported by a filter scan worker.
#[derive(Debug)]
pub enum FilterUpdate {
    /// The row at `position` matched.
    Match(usize),
    /// The predicate failed for `position`; the scan keeps going.
    RowError { position: usize, reason: String },
    /// The scan finished after examining `scanned` positions.
    Done { scanned: usize },
}

/// One in-flight or finished filter scan and its growing match list.
///
/// The owning view drains progress once per draw pass through
/// [`FilterTask::poll`]; matched positions only ever grow and stay in
/// increasing order. Each task has its own channel, so a superseded task's
/// late writes can never leak into its successor.
#[derive(Debug)]
pub struct FilterTask {
    cancel: Arc<AtomicBool>,
    updates: Receiver<FilterUpdate>,
    matched: Vec<usize>,
    scanned: usize,
    error: Option<SheetError>,
    error_rows: usize,
    complete: bool,
}

impl FilterTask {
    /// Compile `spec` and scan the whole index with it.
    ///
    /// Sheets at or under [`TEXT_FILTER_INLINE_MAX`] positions are scanned
    /// before this returns; larger ones hand the scan to a worker. An invalid
    /// pattern fails up front and no task starts.
    pub fn start_text(
        meta: Arc<SheetMeta>,
        index: Arc<RowIndex>,
        rows: Arc<dyn RowSource>,
        spec: &TextFilterSpec,
    ) -> Result<Self, SheetError> {
        let filter = TextFilter::new(spec)?;
        let inline = index.len() <= TEXT_FILTER_INLINE_MAX;
        let mut task = Self::start_scan(meta, index, rows, CompiledPredicate::Text(filter), inline);
        if inline {
            task.poll();
        }
        Ok(task)
    }

    /// Scan the whole index with `predicate` on a worker.
    #[must_use]
    pub fn start_custom(
        meta: Arc<SheetMeta>,
        index: Arc<RowIndex>,
        rows: Arc<dyn RowSource>,
        predicate: RowPredicate,
    ) -> Self {
        Self::start_scan(
            meta,
            index,
            rows,
            CompiledPredicate::Custom(predicate),
            false,
        )
    }

    fn start_scan(
        meta: Arc<SheetMeta>,
        index: Arc<RowIndex>,
        rows: Arc<dyn RowSource>,
        predicate: CompiledPredicate,
        inline: bool,
    ) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let (sender, updates) = mpsc::channel();

        let job = {
            let cancel = cancel.clone();
            move || {
                if let Err(err) =
                    scan_rows(&meta, &index, rows.as_ref(), &predicate, &cancel, &sender)
                {
                    debug!("Filter scan over '{}' stopped: {err}", meta.name);
                }
            }
        };

        if inline {
            job();
        } else {
            perform_work(job);
        }

        Self {
            cancel,
            updates,
            matched: Vec::new(),
            scanned: 0,
            error: None,
            error_rows: 0,
            complete: false,
        }
    }

    /// Drain pending scan progress into the match list. Called once per draw
    /// pass; the list stays stable for the rest of the pass. After
    /// [`FilterTask::cancel`] nothing is drained anymore, so the match list
    /// is frozen even if the worker raced a few more sends in, and any
    /// recorded error is withdrawn.
    pub fn poll(&mut self) {
        if self.cancelled() {
            self.complete = true;
            self.error = None;
            return;
        }

        loop {
            match self.updates.try_recv() {
                Ok(FilterUpdate::Match(position)) => self.matched.push(position),
                Ok(FilterUpdate::RowError { position, reason }) => {
                    self.error_rows += 1;
                    if self.error.is_none() {
                        self.error = Some(SheetError::Predicate { position, reason });
                    }
                }
                Ok(FilterUpdate::Done { scanned }) => {
                    self.scanned = scanned;
                    self.complete = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.complete = true;
                    break;
                }
            }
        }
    }

    /// Ask the worker to stop at its next row check and freeze the results.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Dense positions matched so far, strictly increasing.
    #[must_use]
    pub fn matched(&self) -> &[usize] {
        &self.matched
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Positions the finished scan examined. Zero until completion.
    #[must_use]
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// First predicate failure of this scan, if any. Cancellation withdraws
    /// it along with the rest of the pending progress.
    #[must_use]
    pub fn error(&self) -> Option<&SheetError> {
        self.error.as_ref()
    }

    /// Rows whose predicate failed; the scan keeps going past them.
    #[must_use]
    pub fn error_rows(&self) -> usize {
        self.error_rows
    }
}

impl Drop for FilterTask {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/// Strict sequential scan over `0..index.len()`. The cancel flag is checked
/// before every row; a set flag aborts with `Cancelled` and nothing further
/// is sent.
fn scan_rows(
    meta: &SheetMeta,
    index: &RowIndex,
    rows: &dyn RowSource,
    predicate: &CompiledPredicate,
    cancel: &AtomicBool,
    updates: &Sender<FilterUpdate>,
) -> Result<(), SheetError> {
    for position in 0..index.len() {
        if cancel.load(Ordering::Relaxed) {
            return Err(SheetError::Cancelled);
        }

        // Blank rows cannot match; the scan still counts them as examined.
        let Some(row) = resolve(meta, index, rows, position).ok().flatten() else {
            continue;
        };

        match predicate {
            CompiledPredicate::Text(filter) => {
                if filter.matches(&row.display_text()) {
                    let _ = updates.send(FilterUpdate::Match(position));
                }
            }
            CompiledPredicate::Custom(predicate) => match predicate.as_ref()(&row) {
                Ok(true) => {
                    let _ = updates.send(FilterUpdate::Match(position));
                }
                Ok(false) => {}
                Err(err) => {
                    let _ = updates.send(FilterUpdate::RowError {
                        position,
                        reason: err.to_string(),
                    });
                }
            },
        }
    }

    let _ = updates.send(FilterUpdate::Done {
        scanned: index.len(),
    });
    Ok(())
}
