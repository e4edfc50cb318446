//! History Log
//!
//! Rolling log of answers, newest first. Each entry keeps the full answer text
//! and a short summary derived from it, plus the time the entry was created.
//!
//! # Invariants
//!
//! - `summary` is never authored directly: every write to `full` goes through
//!   [`HistoryEntry::set_full`], which recomputes it.
//! - The active index always points at an existing entry while the log is
//!   non-empty.
//! - Entries are only ever added at the front. When a capacity bound is set,
//!   the oldest entries fall off the back.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

/// Number of characters of the full text kept in a summary
pub const SUMMARY_CHARS: usize = 30;

/// Marker appended to every derived summary
pub const ELLIPSIS: &str = "...";

/// Summary shown for an entry whose answer has not produced any text yet
pub const THINKING_MARKER: &str = "Thinking...";

/// Derive the preview summary for a full answer text
///
/// Takes the first [`SUMMARY_CHARS`] characters, replaces newlines with
/// spaces and appends [`ELLIPSIS`].
#[must_use]
pub fn summarize(full: &str) -> String {
    let mut summary: String = full
        .chars()
        .take(SUMMARY_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    summary.push_str(ELLIPSIS);
    summary
}

/// A single answer in the history log
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    summary: String,
    full: String,
    time: DateTime<Local>,
}

impl HistoryEntry {
    /// Create the placeholder entry shown while an answer is being generated
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            summary: THINKING_MARKER.to_string(),
            full: String::new(),
            time: Local::now(),
        }
    }

    /// Create an entry holding a finished answer
    #[must_use]
    pub fn with_text(full: impl Into<String>) -> Self {
        let full = full.into();
        Self {
            summary: summarize(&full),
            full,
            time: Local::now(),
        }
    }

    /// Replace the full text, recomputing the summary
    pub fn set_full(&mut self, full: &str) {
        full.clone_into(&mut self.full);
        self.summary = summarize(full);
    }

    /// Short preview of the answer
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Complete answer text (raw, before rendering)
    #[must_use]
    pub fn full(&self) -> &str {
        &self.full
    }

    /// When the entry was created
    #[must_use]
    pub fn time(&self) -> DateTime<Local> {
        self.time
    }

    /// Wall-clock label for list displays (`HH:MM:SS`)
    #[must_use]
    pub fn time_label(&self) -> String {
        self.time.format("%H:%M:%S").to_string()
    }
}

/// A history index that does not point at an entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize)]
#[error("history index {index} out of range (len {len})")]
pub struct IndexOutOfRange {
    /// Requested index
    pub index: usize,
    /// Log length at the time of the request
    pub len: usize,
}

/// Ordered log of answers, newest at index 0
#[derive(Clone, Debug, Default)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    active: usize,
    /// Maximum number of entries to keep (0 = unlimited)
    max_entries: usize,
}

impl HistoryLog {
    /// Create an unbounded log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log that keeps at most `max_entries` answers (0 = unlimited)
    #[must_use]
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::default()
        }
    }

    /// Configured capacity (0 = unlimited)
    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index` (0 = newest)
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Newest entry
    #[must_use]
    pub fn front(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Iterate entries newest first
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Index of the entry currently displayed
    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Entry currently displayed
    #[must_use]
    pub fn active(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.active)
    }

    /// Point the active index at `index`
    ///
    /// Out-of-range requests leave the active index untouched.
    pub fn select(&mut self, index: usize) -> Result<&HistoryEntry, IndexOutOfRange> {
        let len = self.entries.len();
        match self.entries.get(index) {
            Some(entry) => {
                self.active = index;
                Ok(entry)
            }
            None => Err(IndexOutOfRange { index, len }),
        }
    }

    /// Insert an entry at the front, evicting from the back if over capacity
    ///
    /// Returns the number of evicted entries. The active index moves to the
    /// new entry.
    pub fn push_front(&mut self, entry: HistoryEntry) -> usize {
        self.entries.push_front(entry);
        self.active = 0;

        let mut evicted = 0;
        if self.max_entries > 0 {
            while self.entries.len() > self.max_entries {
                self.entries.pop_back();
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::debug!(
                evicted,
                max_entries = self.max_entries,
                "Evicted oldest history entries"
            );
        }
        evicted
    }

    /// Overwrite the newest entry in place
    ///
    /// Returns the replaced entry, or `None` (and inserts) if the log was empty.
    pub fn replace_front(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        self.active = 0;
        match self.entries.front_mut() {
            Some(front) => Some(std::mem::replace(front, entry)),
            None => {
                self.entries.push_front(entry);
                None
            }
        }
    }

    /// Set the full text of the entry at `index`, recomputing its summary
    pub fn set_full(&mut self, index: usize, full: &str) -> Result<(), IndexOutOfRange> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(IndexOutOfRange { index, len })?;
        entry.set_full(full);
        Ok(())
    }

    /// Copy of all entries, newest first
    #[must_use]
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_summarize_short_text() {
        assert_eq!(summarize("Hello"), "Hello...");
        assert_eq!(summarize(""), "...");
    }

    #[test]
    fn test_summarize_truncates_and_flattens_newlines() {
        let full = "line one\nline two\nline three is rather long";
        let summary = summarize(full);

        assert_eq!(summary, "line one line two line three i...");
        assert_eq!(summary.chars().count(), SUMMARY_CHARS + ELLIPSIS.len());
    }

    #[test]
    fn test_summarize_counts_characters_not_bytes() {
        let full = "答".repeat(40);
        let summary = summarize(&full);
        assert_eq!(summary, format!("{}...", "答".repeat(30)));
    }

    #[test]
    fn test_set_full_recomputes_summary() {
        let mut entry = HistoryEntry::placeholder();
        assert_eq!(entry.summary(), THINKING_MARKER);
        assert_eq!(entry.full(), "");

        entry.set_full("An answer\nwith lines");
        assert_eq!(entry.full(), "An answer\nwith lines");
        assert_eq!(entry.summary(), "An answer with lines...");
    }

    #[test]
    fn test_time_label_format() {
        let entry = HistoryEntry::placeholder();
        let label = entry.time_label();
        assert_eq!(label.len(), 8);
        assert_eq!(label.matches(':').count(), 2);
    }

    #[test]
    fn test_push_front_orders_newest_first() {
        let mut log = HistoryLog::new();
        log.push_front(HistoryEntry::with_text("first"));
        log.push_front(HistoryEntry::with_text("second"));

        assert_eq!(log.len(), 2);
        assert_eq!(log.get(0).map(HistoryEntry::full), Some("second"));
        assert_eq!(log.get(1).map(HistoryEntry::full), Some("first"));
        assert_eq!(log.active_index(), 0);
    }

    #[test]
    fn test_unbounded_log_never_evicts() {
        let mut log = HistoryLog::new();
        for i in 0..500 {
            assert_eq!(log.push_front(HistoryEntry::with_text(format!("a{i}"))), 0);
        }
        assert_eq!(log.len(), 500);
    }

    #[test]
    fn test_bounded_log_evicts_oldest() {
        let mut log = HistoryLog::with_max_entries(2);
        log.push_front(HistoryEntry::with_text("a"));
        log.push_front(HistoryEntry::with_text("b"));
        let evicted = log.push_front(HistoryEntry::with_text("c"));

        assert_eq!(evicted, 1);
        assert_eq!(log.len(), 2);
        let texts: Vec<&str> = log.entries().map(HistoryEntry::full).collect();
        assert_eq!(texts, vec!["c", "b"]);
    }

    #[test]
    fn test_replace_front_keeps_length() {
        let mut log = HistoryLog::new();
        log.push_front(HistoryEntry::with_text("old"));
        log.push_front(HistoryEntry::with_text("older answer is newer"));

        let replaced = log.replace_front(HistoryEntry::placeholder());

        assert_eq!(replaced.map(|e| e.full().to_string()).as_deref(), Some("older answer is newer"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.get(0).map(HistoryEntry::full), Some(""));
        assert_eq!(log.get(1).map(HistoryEntry::full), Some("old"));
    }

    #[test]
    fn test_replace_front_on_empty_inserts() {
        let mut log = HistoryLog::new();
        assert!(log.replace_front(HistoryEntry::placeholder()).is_none());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_select_in_and_out_of_range() {
        let mut log = HistoryLog::new();
        log.push_front(HistoryEntry::with_text("a"));
        log.push_front(HistoryEntry::with_text("b"));

        assert_eq!(log.select(1).map(HistoryEntry::full), Ok("a"));
        assert_eq!(log.active_index(), 1);

        let err = log.select(5).unwrap_err();
        assert_eq!(err, IndexOutOfRange { index: 5, len: 2 });
        assert_eq!(log.active_index(), 1);
    }

    #[test]
    fn test_set_full_out_of_range() {
        let mut log = HistoryLog::new();
        assert_eq!(
            log.set_full(0, "text"),
            Err(IndexOutOfRange { index: 0, len: 0 })
        );
    }
}
