//! The renaming ledger: one row per attempted image.
//!
//! Every job that gets past the cancellation check appends exactly one
//! [`LedgerEntry`] when it settles. A successful rename records the suggested
//! name; any failure records an empty suggestion. Skipped jobs append nothing.
//! Rows arrive in completion order, not input order.

use serde::Serialize;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub original_name: String,
    /// Empty when the image could not be renamed.
    pub new_name_suggestion: String,
}

impl LedgerEntry {
    pub fn renamed(original_name: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            new_name_suggestion: suggestion.into(),
        }
    }

    pub fn failed(original_name: impl Into<String>) -> Self {
        Self::renamed(original_name, String::new())
    }

    pub fn is_renamed(&self) -> bool {
        !self.new_name_suggestion.is_empty()
    }
}

/// Append-only, shareable collection of [`LedgerEntry`] rows.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: LedgerEntry) {
        self.lock().push(entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the rows recorded so far.
    pub fn snapshot(&self) -> Vec<LedgerEntry> {
        self.lock().clone()
    }

    // A panic while holding the lock cannot leave a half-pushed row behind,
    // so a poisoned lock is still safe to read.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LedgerEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
