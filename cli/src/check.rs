//! `glint check`: one-shot validation of files on disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glint_engine::GlintConfig;
use glint_provision::Tool;
use glint_types::{DocumentId, ShaderStage};
use glint_validate::{FileSource, ValidationRequest, Validator};
use url::Url;

/// Validate `files`, printing one line per diagnostic. Returns `Ok(false)`
/// when any file has errors or could not be validated.
pub async fn run(
    config: &GlintConfig,
    stage: Option<ShaderStage>,
    via_file: bool,
    files: &[PathBuf],
) -> Result<bool> {
    let provisioner = config
        .provision
        .provisioner()
        .context("resolving host platform")?;
    let location = provisioner
        .ensure_binary(Tool::Validator)
        .await
        .context("provisioning glslangValidator")?;
    let validator = Validator::new(location.absolute());

    let mut clean = true;
    for path in files {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let mut request = ValidationRequest::new(document_id(path), text)
            .with_kill_timeout(config.validation.kill_timeout());
        if let Some(stage) = stage {
            request = request.with_stage(stage);
        }

        let result = if via_file {
            validator
                .validate_via_file(&request, &FileSource::OnDisk(path.clone()))
                .await
        } else {
            validator.validate_via_stdin(&request).await
        };

        match result {
            Ok(outcome) => {
                if outcome.termination.timed_out() {
                    eprintln!("warning: {}: validator timed out", path.display());
                }
                for diagnostic in &outcome.diagnostics {
                    println!("{}", diagnostic.display_with_path(path));
                }
                clean &= outcome.is_clean();
            }
            Err(e) => {
                tracing::error!(path = %path.display(), "Validation failed: {e}");
                eprintln!("error: {}: {e}", path.display());
                clean = false;
            }
        }
    }
    Ok(clean)
}

/// `file://` URI for `path`, or the path itself when it cannot be made
/// absolute.
fn document_id(path: &Path) -> DocumentId {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match Url::from_file_path(&absolute) {
        Ok(url) => DocumentId::new(url.to_string()),
        Err(()) => DocumentId::new(path.display().to_string()),
    }
}
