//! Filtering of the sheet list: name matching for the sidebar and the
//! background scan that finds sheets containing a text.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use derive_more::Display;
use enum_iterator::Sequence;
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use itertools::Itertools;
use regex::{Regex, RegexBuilder, escape};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::SheetError;
use crate::async_util::perform_work;
use crate::filter::TextFilter;
use crate::model::{Locale, TextFilterSpec};
use crate::row_index::{RowIndex, resolve};
use crate::source::TableSource;

#[derive(Debug, Display, PartialEq, Serialize, Deserialize, Sequence)]
pub enum SheetNameFilterKind {
    #[display("Fuzzy")]
    Fuzzy,

    #[display("Regular expression")]
    Regex,

    #[display("Sheet starts with")]
    Start,

    #[display("Sheet contains")]
    Contain,
}

/// Name filter state for the sheet list.
#[derive(Serialize, Deserialize)]
pub struct SheetNameFilter {
    pub kind: SheetNameFilterKind,
    pub text: String,
    pub case_insensitive: bool,
    #[serde(skip)]
    cache: RefCell<NameFilterRegexCache>,
}

// Compiled-regex cache so every keystroke does not recompile the pattern.
#[derive(Default)]
struct NameFilterRegexCache {
    regex_pattern: Option<String>,
    regex_case_insensitive: bool,
    regex: Option<Regex>,
    regex_error: Option<String>,
}

impl Default for SheetNameFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetNameFilter {
    #[must_use]
    pub fn new() -> SheetNameFilter {
        SheetNameFilter {
            kind: SheetNameFilterKind::Contain,
            text: String::new(),
            case_insensitive: true,
            cache: RefCell::new(Default::default()),
        }
    }

    fn name_filter_fn(&self) -> Box<dyn FnMut(&str) -> bool> {
        if self.text.is_empty() {
            if self.kind == SheetNameFilterKind::Regex {
                let mut cache = self.cache.borrow_mut();
                cache.regex_pattern = None;
                cache.regex = None;
                cache.regex_error = None;
            }
            return Box::new(|_sheet_name| true);
        }

        let kind = &self.kind;
        let filter_text = self.text.clone();
        let case_insensitive = self.case_insensitive;

        // Clone an owned regex out of the cache so the returned closure does
        // not borrow self.
        let mut owned_regex: Option<Regex> = None;

        if *kind != SheetNameFilterKind::Fuzzy {
            let mut cache = self.cache.borrow_mut();

            let pattern = match kind {
                SheetNameFilterKind::Regex => filter_text.clone(),
                SheetNameFilterKind::Start => format!("^{}", escape(&filter_text)),
                SheetNameFilterKind::Contain => escape(&filter_text),
                SheetNameFilterKind::Fuzzy => unreachable!(),
            };
            let rebuild = (cache.regex_pattern.as_ref() != Some(&pattern))
                || cache.regex_case_insensitive != case_insensitive
                || cache.regex.is_none();

            if rebuild {
                cache.regex_pattern = Some(pattern.clone());
                cache.regex_case_insensitive = case_insensitive;
                match RegexBuilder::new(&pattern)
                    .case_insensitive(case_insensitive)
                    .build()
                {
                    Ok(regex) => {
                        cache.regex = Some(regex);
                        cache.regex_error = None;
                    }
                    Err(err) => {
                        cache.regex = None;
                        cache.regex_error = Some(err.to_string());
                    }
                }
            }

            if let Some(regex) = cache.regex.as_ref() {
                owned_regex = Some(regex.clone());
            }
        }

        match kind {
            SheetNameFilterKind::Fuzzy => {
                let mut matcher = SkimMatcherV2::default();
                matcher = if case_insensitive {
                    matcher.ignore_case()
                } else {
                    matcher.respect_case()
                };
                let pattern = filter_text;
                Box::new(move |sheet_name| matcher.fuzzy_match(sheet_name, &pattern).is_some())
            }
            SheetNameFilterKind::Regex
            | SheetNameFilterKind::Start
            | SheetNameFilterKind::Contain => {
                if let Some(regex) = owned_regex {
                    Box::new(move |sheet_name| regex.is_match(sheet_name))
                } else {
                    // Invalid pattern matches nothing.
                    Box::new(|_sheet_name| false)
                }
            }
        }
    }

    /// Sheet names passing the filter, in their original order.
    pub fn matching_sheets(&self, names: &[String]) -> Vec<String> {
        let mut name_filter = self.name_filter_fn();
        names
            .iter()
            .filter(|name| name_filter(name))
            .cloned()
            .collect_vec()
    }

    /// Returns true if the current kind is `Regex` and the cached compiled
    /// regex is invalid.
    pub fn is_regex_and_invalid(&self) -> bool {
        if self.kind != SheetNameFilterKind::Regex {
            return false;
        }
        let cache = self.cache.borrow();
        cache.regex_error.is_some()
    }

    /// Returns the regex error message if the current kind is `Regex` and the
    /// compilation failed.
    pub fn regex_error(&self) -> Option<String> {
        if self.kind != SheetNameFilterKind::Regex {
            return None;
        }
        let cache = self.cache.borrow();
        cache.regex_error.clone()
    }
}

enum SheetScanUpdate {
    /// Some row of the named sheet matched.
    Hit(String),
    /// One sheet fully examined (or skipped because it failed to open).
    SheetDone,
    /// All sheets examined.
    Done,
}

/// Background scan answering "which sheets contain this text?".
///
/// Sheets report at most one hit each; hit order follows the source's sheet
/// order. Like [`crate::FilterTask`], results are drained once per draw pass
/// and freeze on cancellation.
#[derive(Debug)]
pub struct SheetContentScan {
    cancel: Arc<AtomicBool>,
    updates: Receiver<SheetScanUpdate>,
    hits: Vec<String>,
    scanned_sheets: usize,
    complete: bool,
}

impl SheetContentScan {
    /// Start scanning every sheet of `source` under `locale` for rows
    /// matching `spec`. An invalid pattern fails here and no scan starts.
    pub fn start(
        source: Arc<dyn TableSource>,
        locale: Locale,
        spec: &TextFilterSpec,
    ) -> Result<Self, SheetError> {
        let filter = TextFilter::new(spec)?;
        let cancel = Arc::new(AtomicBool::new(false));
        let (sender, updates) = mpsc::channel();

        let job = {
            let cancel = cancel.clone();
            move || {
                if let Err(err) = scan_sheets(source.as_ref(), &locale, &filter, &cancel, &sender) {
                    debug!("Sheet content scan stopped: {err}");
                }
            }
        };
        perform_work(job);

        Ok(Self {
            cancel,
            updates,
            hits: Vec::new(),
            scanned_sheets: 0,
            complete: false,
        })
    }

    /// Drain pending scan progress. After [`SheetContentScan::cancel`] the
    /// hit list is frozen.
    pub fn poll(&mut self) {
        if self.cancelled() {
            self.complete = true;
            return;
        }

        loop {
            match self.updates.try_recv() {
                Ok(SheetScanUpdate::Hit(name)) => self.hits.push(name),
                Ok(SheetScanUpdate::SheetDone) => self.scanned_sheets += 1,
                Ok(SheetScanUpdate::Done) => self.complete = true,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.complete = true;
                    break;
                }
            }
        }
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Names of sheets with at least one matching row, in source order.
    #[must_use]
    pub fn hits(&self) -> &[String] {
        &self.hits
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Sheets fully examined so far.
    #[must_use]
    pub fn scanned_sheets(&self) -> usize {
        self.scanned_sheets
    }
}

impl Drop for SheetContentScan {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

fn scan_sheets(
    source: &dyn TableSource,
    locale: &Locale,
    filter: &TextFilter,
    cancel: &AtomicBool,
    updates: &Sender<SheetScanUpdate>,
) -> Result<(), SheetError> {
    for name in source.sheet_names() {
        if cancel.load(Ordering::Relaxed) {
            return Err(SheetError::Cancelled);
        }

        let Some(sheet) = source.open(&name, locale) else {
            debug!("Sheet '{name}' did not open for {locale}, skipping");
            let _ = updates.send(SheetScanUpdate::SheetDone);
            continue;
        };

        let index = RowIndex::build(&sheet.meta);
        for position in 0..index.len() {
            if cancel.load(Ordering::Relaxed) {
                return Err(SheetError::Cancelled);
            }
            let Some(row) = resolve(&sheet.meta, &index, sheet.rows.as_ref(), position)
                .ok()
                .flatten()
            else {
                continue;
            };
            if filter.matches(&row.display_text()) {
                let _ = updates.send(SheetScanUpdate::Hit(name.clone()));
                break;
            }
        }
        let _ = updates.send(SheetScanUpdate::SheetDone);
    }

    let _ = updates.send(SheetScanUpdate::Done);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = SheetNameFilter::new();
        assert!(filter.text.is_empty());

        let mut filter_fn = filter.name_filter_fn();
        assert!(filter_fn("Item"));
        assert!(filter_fn("anything"));
        assert!(filter_fn(""));
    }

    #[test]
    fn test_contain_filter_basic() {
        let mut filter = SheetNameFilter::new();
        filter.kind = SheetNameFilterKind::Contain;
        filter.text = "Item".to_string();
        filter.case_insensitive = false;

        let mut filter_fn = filter.name_filter_fn();
        assert!(filter_fn("Item"));
        assert!(filter_fn("ItemAction"));
        assert!(filter_fn("EventItem"));
        assert!(!filter_fn("item"));
        assert!(!filter_fn("Quest"));
    }

    #[test]
    fn test_contain_filter_case_insensitive() {
        let mut filter = SheetNameFilter::new();
        filter.kind = SheetNameFilterKind::Contain;
        filter.text = "Item".to_string();
        filter.case_insensitive = true;

        let mut filter_fn = filter.name_filter_fn();
        assert!(filter_fn("item"));
        assert!(filter_fn("ITEM"));
        assert!(filter_fn("eventitemlist"));
        assert!(!filter_fn("Quest"));
    }

    #[test]
    fn test_start_filter() {
        let mut filter = SheetNameFilter::new();
        filter.kind = SheetNameFilterKind::Start;
        filter.text = "Quest".to_string();
        filter.case_insensitive = false;

        let mut filter_fn = filter.name_filter_fn();
        assert!(filter_fn("Quest"));
        assert!(filter_fn("QuestDialogue"));
        assert!(!filter_fn("SideQuest"));
        assert!(!filter_fn("quest"));
    }

    #[test]
    fn test_regex_filter_valid() {
        let mut filter = SheetNameFilter::new();
        filter.kind = SheetNameFilterKind::Regex;
        filter.text = r"^Item\d+$".to_string();
        filter.case_insensitive = false;

        let mut filter_fn = filter.name_filter_fn();
        assert!(filter_fn("Item0"));
        assert!(filter_fn("Item123"));
        assert!(!filter_fn("Item"));
        assert!(!filter_fn("MyItem0"));
    }

    #[test]
    fn test_regex_filter_invalid() {
        let mut filter = SheetNameFilter::new();
        filter.kind = SheetNameFilterKind::Regex;
        filter.text = "[invalid(".to_string();
        filter.case_insensitive = false;

        let mut filter_fn = filter.name_filter_fn();
        assert!(!filter_fn("anything"));
        assert!(!filter_fn("Item"));

        assert!(filter.is_regex_and_invalid());
        let error = filter.regex_error();
        assert!(error.is_some());
        assert!(error.unwrap().contains("unclosed"));
    }

    #[test]
    fn test_is_regex_and_invalid_only_for_regex_kind() {
        let mut filter = SheetNameFilter::new();
        filter.text = "[invalid(".to_string();

        filter.kind = SheetNameFilterKind::Contain;
        let _ = filter.name_filter_fn();
        assert!(!filter.is_regex_and_invalid());

        filter.kind = SheetNameFilterKind::Fuzzy;
        let _ = filter.name_filter_fn();
        assert!(!filter.is_regex_and_invalid());

        filter.kind = SheetNameFilterKind::Regex;
        let _ = filter.name_filter_fn();
        assert!(filter.is_regex_and_invalid());
    }

    #[test]
    fn test_fuzzy_filter() {
        let mut filter = SheetNameFilter::new();
        filter.kind = SheetNameFilterKind::Fuzzy;
        filter.text = "qdl".to_string();
        filter.case_insensitive = true;

        let mut filter_fn = filter.name_filter_fn();
        assert!(filter_fn("QuestDialogue"));
        assert!(!filter_fn("ldq_reversed"));
    }

    #[test]
    fn test_special_chars_escaped_in_contain() {
        let mut filter = SheetNameFilter::new();
        filter.kind = SheetNameFilterKind::Contain;
        filter.text = "Item[0]".to_string();
        filter.case_insensitive = false;

        let mut filter_fn = filter.name_filter_fn();
        assert!(filter_fn("Item[0]"));
        assert!(filter_fn("MyItem[0]List"));
        assert!(!filter_fn("Item0"));
        assert!(!filter_fn("ItemA"));
    }

    #[test]
    fn test_cache_reuses_compiled_regex() {
        let mut filter = SheetNameFilter::new();
        filter.kind = SheetNameFilterKind::Regex;
        filter.text = r"\d+".to_string();
        filter.case_insensitive = false;

        let mut fn1 = filter.name_filter_fn();
        assert!(fn1("Item123"));

        let mut fn2 = filter.name_filter_fn();
        assert!(fn2("456"));

        let cache = filter.cache.borrow();
        assert_eq!(cache.regex_pattern.as_ref().unwrap(), r"\d+");
        assert!(cache.regex.is_some());
    }

    #[test]
    fn test_cache_rebuilds_on_pattern_change() {
        let mut filter = SheetNameFilter::new();
        filter.kind = SheetNameFilterKind::Contain;
        filter.text = "Item".to_string();
        filter.case_insensitive = false;

        let mut fn1 = filter.name_filter_fn();
        assert!(fn1("ItemAction"));

        filter.text = "Quest".to_string();
        let mut fn2 = filter.name_filter_fn();
        assert!(fn2("QuestDialogue"));
        assert!(!fn2("ItemAction"));
    }

    #[test]
    fn test_matching_sheets_keeps_source_order() {
        let mut filter = SheetNameFilter::new();
        filter.kind = SheetNameFilterKind::Contain;
        filter.text = "e".to_string();

        let names = [
            "Mount".to_string(),
            "Emote".to_string(),
            "Achievement".to_string(),
            "Balloon".to_string(),
        ];
        assert_eq!(
            filter.matching_sheets(&names),
            vec!["Emote".to_string(), "Achievement".to_string()]
        );
    }

    #[test]
    fn test_default_filter_settings() {
        let filter = SheetNameFilter::new();

        assert_eq!(filter.kind, SheetNameFilterKind::Contain);
        assert_eq!(filter.text, "");
        assert!(filter.case_insensitive);
    }
}
