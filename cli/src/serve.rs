//! `glint serve`: a JSON-lines bridge between an editor and the coordinator.
//!
//! Input, one object per line on stdin:
//!
//! ```text
//! {"kind":"open","uri":"file:///a.frag","text":"..."}
//! {"kind":"change","uri":"file:///a.frag","text":"..."}
//! {"kind":"save","uri":"file:///a.frag","text":"..."}
//! {"kind":"close","uri":"file:///a.frag"}
//! ```
//!
//! Output on stdout is `{"uri":...,"diagnostics":[...]}` per publication and
//! `{"error":...}` per user-facing error.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use glint_engine::{Coordinator, DocumentEvent, GlintConfig};
use glint_types::{Diagnostic, DocumentId};
use glint_validate::DiagnosticSink;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use url::Url;

const EVENT_CHANNEL_CAPACITY: usize = 64;

const GLSL_EXTENSIONS: &[&str] = &["glsl", "vert", "frag", "comp", "vs", "fs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum EventKind {
    Open,
    Change,
    Save,
    Close,
}

#[derive(Debug, Deserialize)]
struct EventLine {
    kind: EventKind,
    uri: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

impl EventLine {
    /// `Ok(None)` for documents that are not GLSL.
    fn into_event(self) -> Result<Option<DocumentEvent>, String> {
        if !is_glsl_document(&self.uri, self.language.as_deref()) {
            return Ok(None);
        }
        let document = DocumentId::new(self.uri);
        if self.kind == EventKind::Close {
            return Ok(Some(DocumentEvent::Closed { document }));
        }
        let Some(text) = self.text else {
            return Err(format!("'{document}': missing text"));
        };
        Ok(Some(match self.kind {
            EventKind::Open => DocumentEvent::Opened { document, text },
            EventKind::Change => DocumentEvent::Changed { document, text },
            EventKind::Save | EventKind::Close => DocumentEvent::Saved { document, text },
        }))
    }
}

/// Whether a document should be validated, by explicit language id or by the
/// extension of its URI path.
pub fn is_glsl_document(uri: &str, language: Option<&str>) -> bool {
    if let Some(language) = language {
        return language.eq_ignore_ascii_case("glsl");
    }
    let path = match Url::parse(uri) {
        Ok(url) => url.path().to_string(),
        Err(_) => uri.to_string(),
    };
    path.rsplit_once('.').is_some_and(|(_, ext)| {
        GLSL_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

/// Sink writing one JSON object per line.
pub struct JsonLineSink<W> {
    out: Mutex<W>,
}

impl<W: Write> JsonLineSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn emit(&self, value: &serde_json::Value) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let written = serde_json::to_writer(&mut *out, value)
            .map_err(std::io::Error::from)
            .and_then(|()| out.write_all(b"\n"))
            .and_then(|()| out.flush());
        if let Err(e) = written {
            tracing::warn!("Failed to write serve output: {e}");
        }
    }
}

impl<W: Write + Send> DiagnosticSink for JsonLineSink<W> {
    fn publish(&self, document: &DocumentId, diagnostics: Vec<Diagnostic>) {
        self.emit(&serde_json::json!({
            "uri": document,
            "diagnostics": diagnostics,
        }));
    }

    fn show_error(&self, message: &str) {
        self.emit(&serde_json::json!({ "error": message }));
    }
}

pub async fn run(config: &GlintConfig) -> Result<()> {
    let sink = Arc::new(JsonLineSink::new(std::io::stdout()));
    let coordinator = Coordinator::start(config, sink.clone()).await;

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let subscription = coordinator.attach(rx);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_event(&line) {
                    Ok(Some(event)) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => {
                        tracing::warn!("Rejected serve input: {message}");
                        sink.show_error(&message);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    drop(tx);
    subscription.join().await;
    coordinator.settle().await;
    coordinator.stop().await;
    Ok(())
}

fn parse_event(line: &str) -> Result<Option<DocumentEvent>, String> {
    let parsed: EventLine =
        serde_json::from_str(line).map_err(|e| format!("invalid event line: {e}"))?;
    parsed.into_event()
}
