//! Analysis server handle. Owns the `glsl_analyzer --stdio` child process.
//!
//! The protocol itself is spoken by an external client; this handle only
//! starts the process, lends out its stdio, and stops it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("failed to start analysis server {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stdio pair for a protocol client speaking to the server.
#[derive(Debug)]
pub struct AnalyzerTransport {
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

pub struct AnalyzerServer {
    binary: PathBuf,
    child: Child,
    transport: Option<AnalyzerTransport>,
    stderr_handle: Option<JoinHandle<()>>,
}

impl AnalyzerServer {
    /// Spawn `<binary> --stdio` with `cwd` as working directory.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(binary: &Path, cwd: &Path) -> Result<Self, AnalyzerError> {
        let mut child = Command::new(binary)
            .arg("--stdio")
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AnalyzerError::Spawn {
                binary: binary.to_path_buf(),
                source,
            })?;

        let transport = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => Some(AnalyzerTransport { stdin, stdout }),
            _ => None,
        };

        let stderr_handle = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => tracing::debug!(target: "glint::analyzer", "{line}"),
                        Ok(None) => break,
                        Err(e) => {
                            tracing::debug!("Analysis server stderr read error: {e}");
                            break;
                        }
                    }
                }
            })
        });

        tracing::info!(binary = %binary.display(), pid = ?child.id(), "Analysis server started");
        Ok(Self {
            binary: binary.to_path_buf(),
            child,
            transport,
            stderr_handle,
        })
    }

    /// Hand the server's stdin/stdout to a protocol client. Only the first
    /// call returns the transport.
    pub fn take_transport(&mut self) -> Option<AnalyzerTransport> {
        self.transport.take()
    }

    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Close stdin if still held, wait briefly for exit, then kill.
    pub async fn stop(mut self) {
        // EOF on stdin ends a --stdio server; a client holding the transport
        // is expected to have closed it already.
        drop(self.transport.take());

        let exited = tokio::time::timeout(
            Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
            self.child.wait(),
        )
        .await;

        if exited.is_err() {
            tracing::debug!("Analysis server didn't exit in time, killing");
            let _ = self.child.kill().await;
        }
        if let Some(handle) = self.stderr_handle.take() {
            handle.abort();
        }
        tracing::info!(binary = %self.binary.display(), "Analysis server stopped");
    }
}
