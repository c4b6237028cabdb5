//! Validation state for one editor session.
//!
//! Opened and saved documents are validated immediately, changed documents
//! after a quiet period, and closed documents have their diagnostics cleared.
//! Results reach the [`DiagnosticSink`] only when no newer run for the same
//! document has published first.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use glint_provision::{Provisioner, Tool};
use glint_types::DocumentId;
use glint_validate::{
    Debouncer, DiagnosticSink, RunLedger, ValidationError, ValidationOutcome, ValidationRequest,
    Validator,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::analyzer::{AnalyzerServer, AnalyzerTransport};
use crate::config::GlintConfig;

const SETTLE_POLL: Duration = Duration::from_millis(10);

/// An editor notification about one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    Opened { document: DocumentId, text: String },
    Changed { document: DocumentId, text: String },
    Saved { document: DocumentId, text: String },
    Closed { document: DocumentId },
}

impl DocumentEvent {
    #[must_use]
    pub fn document(&self) -> &DocumentId {
        match self {
            Self::Opened { document, .. }
            | Self::Changed { document, .. }
            | Self::Saved { document, .. }
            | Self::Closed { document } => document,
        }
    }
}

struct Inner {
    /// `None` when the validator could not be provisioned.
    validator: Option<Validator>,
    sink: Arc<dyn DiagnosticSink>,
    ledger: RunLedger,
    debouncer: Debouncer<DocumentId>,
    debounce: Duration,
    kill_timeout: Duration,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Inner {
    fn handle_event(self: &Arc<Self>, event: DocumentEvent) {
        match event {
            DocumentEvent::Opened { document, text } | DocumentEvent::Saved { document, text } => {
                // a pending change carries older text than this event
                self.debouncer.cancel(&document);
                self.spawn_validation(document, text);
            }
            DocumentEvent::Changed { document, text } => {
                let inner = Arc::clone(self);
                let key = document.clone();
                // tracked from now on, so settle sees the change before its timer fires
                let action = self.tracker.track_future(async move {
                    inner.spawn_validation(document, text);
                });
                self.debouncer.schedule(key, self.debounce, action);
            }
            DocumentEvent::Closed { document } => {
                self.debouncer.cancel(&document);
                self.ledger.invalidate(&document);
                self.sink.clear(&document);
            }
        }
    }

    fn spawn_validation(self: &Arc<Self>, document: DocumentId, text: String) {
        if self.cancel.is_cancelled() {
            return;
        }
        let Some(validator) = self.validator.clone() else {
            tracing::debug!(%document, "Validator unavailable, skipping");
            return;
        };

        let seq = self.ledger.begin(&document);
        let request = ValidationRequest::new(document, text).with_kill_timeout(self.kill_timeout);
        let inner = Arc::clone(self);
        self.tracker.spawn(async move {
            tokio::select! {
                () = inner.cancel.cancelled() => {
                    tracing::debug!(document = %request.document, seq, "Validation cancelled");
                }
                result = validator.validate_via_stdin(&request) => {
                    inner.finish_run(&request.document, seq, result);
                }
            }
            inner.ledger.finish(&request.document);
        });
    }

    fn finish_run(
        &self,
        document: &DocumentId,
        seq: u64,
        result: Result<ValidationOutcome, ValidationError>,
    ) {
        match result {
            Ok(outcome) => {
                if outcome.termination.timed_out() {
                    tracing::warn!(%document, "Validator timed out; publishing partial results");
                }
                let diagnostics = outcome.diagnostics;
                self.ledger.publish_if_current(document, seq, || {
                    self.sink.publish(document, diagnostics);
                });
            }
            Err(e) => {
                tracing::error!(%document, "Validation failed: {e}");
                self.sink.show_error(&format!("Shader validation failed: {e}"));
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Event-stream registration returned by [`Coordinator::attach`].
///
/// Dropping or disposing it stops event delivery.
pub struct Subscription {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn dispose(&self) {
        self.token.cancel();
    }

    /// Wait until the event stream ends or the subscription is disposed.
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub struct Coordinator {
    inner: Arc<Inner>,
    analyzer: Mutex<Option<AnalyzerServer>>,
}

impl Coordinator {
    /// Provision the validator, plus the analysis server when enabled, and
    /// return a running coordinator.
    ///
    /// Provisioning and server failures are reported through `sink` and the
    /// log; the coordinator still starts with whatever is available.
    pub async fn start(config: &GlintConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        let provisioner = match config.provision.provisioner() {
            Ok(provisioner) => provisioner,
            Err(e) => {
                tracing::error!("Provisioning unavailable: {e}");
                sink.show_error(&format!("Shader tools unavailable: {e}"));
                return Self::launch(config, sink, None, None);
            }
        };
        let validator = match provisioner.ensure_binary(Tool::Validator).await {
            Ok(location) => Some(Validator::new(location.absolute())),
            Err(e) => {
                tracing::error!(tool = %Tool::Validator, "Provisioning failed: {e}");
                sink.show_error(&format!("{} unavailable: {e}", Tool::Validator));
                None
            }
        };

        let analyzer = if config.analyzer.enabled {
            match provisioner.ensure_binary(Tool::Analyzer).await {
                Ok(location) => start_analyzer(location.absolute(), &provisioner, sink.as_ref()),
                Err(e) => {
                    tracing::error!(tool = %Tool::Analyzer, "Provisioning failed: {e}");
                    sink.show_error(&format!("{} unavailable: {e}", Tool::Analyzer));
                    None
                }
            }
        } else {
            None
        };

        Self::launch(config, sink, validator, analyzer)
    }

    /// Assemble a coordinator from already resolved parts.
    pub fn launch(
        config: &GlintConfig,
        sink: Arc<dyn DiagnosticSink>,
        validator: Option<Validator>,
        analyzer: Option<AnalyzerServer>,
    ) -> Self {
        tracing::info!(
            validator = validator.is_some(),
            analyzer = analyzer.is_some(),
            debounce_ms = config.validation.debounce_ms,
            "Coordinator started"
        );
        Self {
            inner: Arc::new(Inner {
                validator,
                sink,
                ledger: RunLedger::new(),
                debouncer: Debouncer::new(),
                debounce: config.validation.debounce(),
                kill_timeout: config.validation.kill_timeout(),
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
            analyzer: Mutex::new(analyzer),
        }
    }

    #[must_use]
    pub fn has_validator(&self) -> bool {
        self.inner.validator.is_some()
    }

    /// React to one editor event. Never fails; problems go to the sink.
    pub fn handle_event(&self, event: DocumentEvent) {
        self.inner.handle_event(event);
    }

    /// Feed every event from `events` into [`Self::handle_event`] until the
    /// channel closes, the subscription is disposed, or the coordinator stops.
    pub fn attach(&self, mut events: mpsc::Receiver<DocumentEvent>) -> Subscription {
        let token = self.inner.cancel.child_token();
        let task_token = token.clone();
        let inner = Arc::clone(&self.inner);
        let handle = self.inner.tracker.spawn(async move {
            loop {
                tokio::select! {
                    () = task_token.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => inner.handle_event(event),
                        None => break,
                    },
                }
            }
            tracing::debug!("Event subscription ended");
        });
        Subscription {
            token,
            handle: Some(handle),
        }
    }

    /// Wait until no validation is pending or running.
    ///
    /// Attached subscriptions count as running work, so join them first.
    pub async fn settle(&self) {
        // debounced changes are tracked from the moment they are scheduled
        while !self.inner.tracker.is_empty() {
            tokio::time::sleep(SETTLE_POLL).await;
        }
    }

    /// Hand the analysis server's stdio to a protocol client.
    pub fn take_analyzer_transport(&self) -> Option<AnalyzerTransport> {
        lock(&self.analyzer).as_mut()?.take_transport()
    }

    /// Cancel pending and in-flight validations, wait for them to finish,
    /// then stop the analysis server.
    pub async fn stop(&self) {
        self.inner.debouncer.dispose_all();
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;

        let analyzer = lock(&self.analyzer).take();
        if let Some(server) = analyzer {
            server.stop().await;
        }
        tracing::info!("Coordinator stopped");
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.inner.debouncer.dispose_all();
        self.inner.cancel.cancel();
    }
}

fn start_analyzer(
    binary: &Path,
    provisioner: &Provisioner,
    sink: &dyn DiagnosticSink,
) -> Option<AnalyzerServer> {
    match AnalyzerServer::start(binary, provisioner.root()) {
        Ok(server) => Some(server),
        Err(e) => {
            tracing::error!("{e}");
            sink.show_error(&e.to_string());
            None
        }
    }
}
