//! Per-document validation runs against the glslang validator binary.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use glint_types::{Diagnostic, DocumentId, ShaderStage};

use crate::ValidationError;
use crate::parser::parse_output;
use crate::prelude::stage_source;
use crate::process::{Termination, run_with_timeout};

/// Default time a validator run may take before it is killed.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(5);

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One validation job: a snapshot of document text plus its stage.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub document: DocumentId,
    pub text: String,
    pub stage: ShaderStage,
    pub kill_timeout: Duration,
}

impl ValidationRequest {
    /// Build a request, inferring the stage from the document identifier.
    #[must_use]
    pub fn new(document: DocumentId, text: String) -> Self {
        let stage = ShaderStage::infer(document.as_str());
        Self {
            document,
            text,
            stage,
            kill_timeout: DEFAULT_KILL_TIMEOUT,
        }
    }

    pub fn with_stage(mut self, stage: ShaderStage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_kill_timeout(mut self, kill_timeout: Duration) -> Self {
        self.kill_timeout = kill_timeout;
        self
    }
}

/// Where file-mode validation reads the shader from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Validate a file that already exists; the request text is ignored.
    OnDisk(PathBuf),
    /// Write the request text to a uniquely named file in this directory.
    Scratch(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub document: DocumentId,
    pub diagnostics: Vec<Diagnostic>,
    pub termination: Termination,
    /// Combined stdout and stderr, kept for logging.
    pub raw_output: String,
}

impl ValidationOutcome {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Runs the validator binary once per request.
#[derive(Debug, Clone)]
pub struct Validator {
    binary: PathBuf,
}

impl Validator {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Pipe the document text to `--stdin`, prefixed with a stage prelude
    /// when the text has no `#version` of its own.
    pub async fn validate_via_stdin(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationOutcome, ValidationError> {
        let staged = stage_source(&request.text, request.stage);
        let args = stdin_args(request.stage);
        tracing::debug!(
            document = %request.document,
            stage = %request.stage,
            line_offset = staged.line_offset,
            "Validating via stdin"
        );
        let output = run_with_timeout(
            &self.binary,
            args,
            Some(staged.text.into_owned()),
            request.kill_timeout,
        )
        .await?;
        Ok(self.finish(request, output.combined, output.termination, staged.line_offset))
    }

    /// Validate from a file path, either an existing file or a scratch copy
    /// of the request text. Scratch files are left in place.
    pub async fn validate_via_file(
        &self,
        request: &ValidationRequest,
        source: &FileSource,
    ) -> Result<ValidationOutcome, ValidationError> {
        let path = match source {
            FileSource::OnDisk(path) => path.clone(),
            FileSource::Scratch(dir) => {
                let path = dir.join(scratch_file_name(request.stage));
                tokio::fs::write(&path, request.text.as_bytes())
                    .await
                    .map_err(|source| ValidationError::Io {
                        path: path.clone(),
                        source,
                    })?;
                path
            }
        };
        tracing::debug!(
            document = %request.document,
            path = %path.display(),
            "Validating via file"
        );

        let output = run_with_timeout(
            &self.binary,
            file_args(request.stage, &path),
            None,
            request.kill_timeout,
        )
        .await?;
        Ok(self.finish(request, output.combined, output.termination, 0))
    }

    fn finish(
        &self,
        request: &ValidationRequest,
        raw_output: String,
        termination: Termination,
        line_offset: u32,
    ) -> ValidationOutcome {
        tracing::debug!(
            document = %request.document,
            binary = %self.binary.display(),
            ?termination,
            "Validator finished:\n{raw_output}"
        );
        let diagnostics = parse_output(&raw_output, line_offset);
        ValidationOutcome {
            document: request.document.clone(),
            diagnostics,
            termination,
            raw_output,
        }
    }
}

fn stdin_args(stage: ShaderStage) -> Vec<OsString> {
    ["--stdin", "-S", stage.flag()]
        .into_iter()
        .map(OsString::from)
        .collect()
}

fn file_args(stage: ShaderStage, path: &Path) -> Vec<OsString> {
    vec![
        OsString::from("-S"),
        OsString::from(stage.flag()),
        path.as_os_str().to_owned(),
    ]
}

/// `glint-<millis>-<counter>.<stage>`; the counter keeps same-millisecond
/// runs apart.
fn scratch_file_name(stage: ShaderStage) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let counter = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("glint-{millis}-{counter}.{}", stage.flag())
}
