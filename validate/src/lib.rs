//! Shader validation through the `glslangValidator` subprocess.
//!
//! Each run spawns a fresh validator, feeds it the document text, and turns
//! its error lines into [`Diagnostic`](glint_types::Diagnostic)s. The
//! [`Debouncer`] and [`RunLedger`] keep rapid edits from flooding the sink
//! with stale results.

mod debounce;
mod diagnostics;
mod ledger;
mod orchestrator;
mod parser;
mod prelude;
mod process;

use std::path::PathBuf;

pub use debounce::{DEFAULT_DEBOUNCE, Debouncer};
pub use diagnostics::{DiagnosticSink, DiagnosticsStore};
pub use ledger::RunLedger;
pub use orchestrator::{
    DEFAULT_KILL_TIMEOUT, FileSource, ValidationOutcome, ValidationRequest, Validator,
};
pub use parser::{SOURCE, parse_output};
pub use prelude::{StagedSource, has_version_directive, prelude_for, stage_source};
pub use process::Termination;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("failed to spawn validator {}: {source}", binary.display())]
    SpawnFailed {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write an executable `sh` script standing in for the validator.
    pub fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-glslangValidator");
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}
