//! Ordering guard for concurrent validation runs.
//!
//! Runs for the same document may finish out of order. Each run takes a
//! sequence number when it starts, and its results are published only if no
//! later run for that document has already published. A closed document is
//! forgotten once its last in-flight run finishes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use glint_types::DocumentId;

#[derive(Debug, Default)]
struct DocumentRuns {
    /// Last sequence number handed out; sequence numbers start at 1.
    issued: u64,
    /// Highest sequence number whose results were published.
    published: u64,
    /// Runs begun but not yet reported through [`RunLedger::finish`].
    in_flight: u32,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct RunLedger {
    runs: Mutex<HashMap<DocumentId, DocumentRuns>>,
}

impl RunLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DocumentId, DocumentRuns>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new run for `document` and return its sequence number.
    pub fn begin(&self, document: &DocumentId) -> u64 {
        let mut runs = self.lock();
        let entry = runs.entry(document.clone()).or_default();
        entry.issued += 1;
        entry.in_flight += 1;
        entry.closed = false;
        entry.issued
    }

    /// Record that a run for `document` ended, whatever its outcome.
    pub fn finish(&self, document: &DocumentId) {
        let mut runs = self.lock();
        let Some(entry) = runs.get_mut(document) else {
            return;
        };
        entry.in_flight = entry.in_flight.saturating_sub(1);
        if entry.closed && entry.in_flight == 0 {
            runs.remove(document);
        }
    }

    /// Call `publish` if run `seq` is newer than anything published so far.
    ///
    /// `publish` runs under the ledger lock so that two completions for one
    /// document cannot interleave their publishes. Returns whether it ran.
    pub fn publish_if_current<F>(&self, document: &DocumentId, seq: u64, publish: F) -> bool
    where
        F: FnOnce(),
    {
        let mut runs = self.lock();
        let Some(entry) = runs.get_mut(document) else {
            return false;
        };
        if seq <= entry.published {
            tracing::debug!(%document, seq, published = entry.published, "Dropping stale validation result");
            return false;
        }
        entry.published = seq;
        publish();
        true
    }

    /// Discard all in-flight runs for `document`. Runs begun afterwards publish
    /// normally.
    ///
    /// The entry is dropped as soon as no run is in flight; until then its
    /// sequence keeps counting so a reopened document never reuses a number.
    pub fn invalidate(&self, document: &DocumentId) {
        let mut runs = self.lock();
        let Some(entry) = runs.get_mut(document) else {
            return;
        };
        entry.published = entry.issued;
        if entry.in_flight == 0 {
            runs.remove(document);
        } else {
            entry.closed = true;
        }
    }

    /// Number of documents with ledger state.
    #[must_use]
    pub fn tracked_documents(&self) -> usize {
        self.lock().len()
    }
}
