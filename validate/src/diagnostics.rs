//! Where validation results go.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use glint_types::{Diagnostic, DiagnosticsSnapshot, DocumentId};

/// Receiver of per-document diagnostics and user-facing errors.
///
/// Publishing replaces the full set for a document; an empty set clears it.
pub trait DiagnosticSink: Send + Sync {
    fn publish(&self, document: &DocumentId, diagnostics: Vec<Diagnostic>);

    fn clear(&self, document: &DocumentId) {
        self.publish(document, Vec::new());
    }

    fn show_error(&self, message: &str);
}

/// In-memory sink that keeps the latest diagnostics per document.
#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    data: Mutex<HashMap<DocumentId, Vec<Diagnostic>>>,
    errors: Mutex<Vec<String>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DiagnosticsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let mut documents: Vec<(DocumentId, Vec<Diagnostic>)> = lock(&self.data)
            .iter()
            .map(|(doc, items)| (doc.clone(), items.clone()))
            .collect();

        // Sort: documents with errors first, then by identifier
        documents.sort_by(|a, b| {
            let a_has_errors = a.1.iter().any(|d| d.severity().is_error());
            let b_has_errors = b.1.iter().any(|d| d.severity().is_error());
            b_has_errors.cmp(&a_has_errors).then_with(|| a.0.cmp(&b.0))
        });

        DiagnosticsSnapshot::new(documents)
    }

    /// User-facing errors reported so far, oldest first.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        lock(&self.errors).clone()
    }
}

impl DiagnosticSink for DiagnosticsStore {
    fn publish(&self, document: &DocumentId, diagnostics: Vec<Diagnostic>) {
        let mut data = lock(&self.data);
        if diagnostics.is_empty() {
            data.remove(document);
        } else {
            data.insert(document.clone(), diagnostics);
        }
    }

    fn show_error(&self, message: &str) {
        lock(&self.errors).push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_diag(msg: &str, line: u32) -> Diagnostic {
        Diagnostic::whole_line_error(line, msg.to_string(), "test")
    }

    #[test]
    fn empty_snapshot() {
        let store = DiagnosticsStore::new();
        let snap = store.snapshot();
        assert!(snap.is_empty());
        assert_eq!(snap.error_count(), 0);
    }

    #[test]
    fn publish_replaces_previous_set() {
        let store = DiagnosticsStore::new();
        let doc = DocumentId::new("file:///a.frag");
        store.publish(&doc, vec![make_diag("one", 1), make_diag("two", 2)]);
        store.publish(&doc, vec![make_diag("three", 3)]);

        let snap = store.snapshot();
        let diags = snap.for_document(&doc).unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message(), "three");
    }

    #[test]
    fn clear_and_empty_publish_remove_document() {
        let store = DiagnosticsStore::new();
        let a = DocumentId::new("file:///a.frag");
        let b = DocumentId::new("file:///b.vert");
        store.publish(&a, vec![make_diag("err", 1)]);
        store.publish(&b, vec![make_diag("err", 1)]);

        store.clear(&a);
        store.publish(&b, Vec::new());

        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn documents_are_sorted_by_identifier() {
        let store = DiagnosticsStore::new();
        store.publish(&DocumentId::new("file:///b.frag"), vec![make_diag("err", 1)]);
        store.publish(&DocumentId::new("file:///a.frag"), vec![make_diag("err", 1)]);

        let snap = store.snapshot();
        assert_eq!(snap.documents()[0].0.as_str(), "file:///a.frag");
        assert_eq!(snap.documents()[1].0.as_str(), "file:///b.frag");
    }

    #[test]
    fn show_error_is_recorded() {
        let store = DiagnosticsStore::new();
        store.show_error("Failed to spawn validator");
        assert_eq!(store.errors(), vec!["Failed to spawn validator".to_string()]);
    }
}
