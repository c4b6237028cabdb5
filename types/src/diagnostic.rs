//! Structured problem reports produced from validator output.

use serde::Serialize;

use crate::DocumentId;

/// Column sentinel meaning "end of the line, whatever its length".
pub const END_OF_LINE: u32 = u32::MAX;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl DiagnosticSeverity {
    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "info",
            Self::Hint => "hint",
        }
    }
}

/// A single diagnostic anchored to a line span of a document.
///
/// Fields are private; external consumers read via accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    severity: DiagnosticSeverity,
    message: String,
    /// 0-indexed line number.
    line: u32,
    /// 0-indexed start column.
    col_start: u32,
    /// Exclusive end column, or [`END_OF_LINE`].
    col_end: u32,
    /// Tool that reported the diagnostic (e.g. "glslang").
    source: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        severity: DiagnosticSeverity,
        message: String,
        line: u32,
        col_start: u32,
        col_end: u32,
        source: String,
    ) -> Self {
        Self {
            severity,
            message,
            line,
            col_start,
            col_end,
            source,
        }
    }

    /// An error covering the whole of `line`.
    #[must_use]
    pub fn whole_line_error(line: u32, message: String, source: &str) -> Self {
        Self::new(
            DiagnosticSeverity::Error,
            message,
            line,
            0,
            END_OF_LINE,
            source.to_string(),
        )
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 0-indexed line number.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn col_start(&self) -> u32 {
        self.col_start
    }

    #[must_use]
    pub fn col_end(&self) -> u32 {
        self.col_end
    }

    #[must_use]
    pub fn spans_full_line(&self) -> bool {
        self.col_start == 0 && self.col_end == END_OF_LINE
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Format as `path:line:col: severity: [source] message` (1-indexed for display).
    #[must_use]
    pub fn display_with_path(&self, path: &std::path::Path) -> String {
        format!(
            "{}:{}:{}: {}: [{}] {}",
            path.display(),
            self.line + 1,
            self.col_start + 1,
            self.severity.label(),
            self.source,
            self.message,
        )
    }
}

/// Immutable snapshot of published diagnostics, one entry per document.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsSnapshot {
    /// Per-document diagnostics, sorted with error-containing documents first.
    documents: Vec<(DocumentId, Vec<Diagnostic>)>,
}

impl DiagnosticsSnapshot {
    #[must_use]
    pub fn new(documents: Vec<(DocumentId, Vec<Diagnostic>)>) -> Self {
        Self { documents }
    }

    #[must_use]
    pub fn documents(&self) -> &[(DocumentId, Vec<Diagnostic>)] {
        &self.documents
    }

    /// Diagnostics for one document, if any were published.
    #[must_use]
    pub fn for_document(&self, document: &DocumentId) -> Option<&[Diagnostic]> {
        self.documents
            .iter()
            .find(|(id, _)| id == document)
            .map(|(_, items)| items.as_slice())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.documents
            .iter()
            .flat_map(|(_, items)| items)
            .filter(|d| d.severity().is_error())
            .count()
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.documents.iter().map(|(_, items)| items.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_whole_line_error_spans_line() {
        let diag = Diagnostic::whole_line_error(4, "bad".to_string(), "glslang");
        assert!(diag.spans_full_line());
        assert_eq!(diag.col_end(), END_OF_LINE);
        assert!(diag.severity().is_error());
    }

    #[test]
    fn test_display_with_path() {
        let diag = Diagnostic::whole_line_error(
            10,
            "'foo' : undeclared identifier".to_string(),
            "glslang",
        );
        let path = PathBuf::from("shaders/main.frag");
        // line/col are 0-indexed internally, displayed as 1-indexed
        assert_eq!(
            diag.display_with_path(&path),
            "shaders/main.frag:11:1: error: [glslang] 'foo' : undeclared identifier"
        );
    }

    #[test]
    fn test_severity_label() {
        assert_eq!(DiagnosticSeverity::Error.label(), "error");
        assert_eq!(DiagnosticSeverity::Warning.label(), "warning");
        assert!(!DiagnosticSeverity::Hint.is_error());
    }

    #[test]
    fn test_diagnostic_serializes_lowercase_severity() {
        let diag = Diagnostic::whole_line_error(0, "oops".to_string(), "glslang");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["severity"], "error");
        assert_eq!(json["line"], 0);
        assert_eq!(json["col_end"], u64::from(u32::MAX));
    }

    #[test]
    fn test_snapshot_counts() {
        let doc = DocumentId::new("file:///a.frag");
        let snap = DiagnosticsSnapshot::new(vec![(
            doc.clone(),
            vec![
                Diagnostic::whole_line_error(1, "e1".to_string(), "glslang"),
                Diagnostic::new(
                    DiagnosticSeverity::Warning,
                    "w1".to_string(),
                    2,
                    0,
                    END_OF_LINE,
                    "glslang".to_string(),
                ),
            ],
        )]);
        assert_eq!(snap.total_count(), 2);
        assert_eq!(snap.error_count(), 1);
        assert_eq!(snap.for_document(&doc).map(<[Diagnostic]>::len), Some(2));
        assert!(
            snap.for_document(&DocumentId::new("file:///b.frag"))
                .is_none()
        );
    }

    #[test]
    fn test_snapshot_default_is_empty() {
        let snap = DiagnosticsSnapshot::default();
        assert!(snap.is_empty());
        assert_eq!(snap.total_count(), 0);
    }
}
