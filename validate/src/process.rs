//! Validator subprocess supervision.
//!
//! One call owns one child: it is spawned with piped stdio, raced against a
//! kill timeout, and its stdout and stderr are forwarded chunk by chunk into a
//! single channel. Killed processes still yield whatever they wrote.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ValidationError;

/// How long reader tasks may keep draining pipes after the child is gone.
///
/// A grandchild that inherited the pipes can hold them open indefinitely.
const READER_GRACE: Duration = Duration::from_millis(100);

const READ_CHUNK_BYTES: usize = 4096;

/// How a validator run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own; `None` when terminated by a signal.
    Exited(Option<i32>),
    /// Outlived its kill timeout and was killed.
    TimedOut,
}

impl Termination {
    #[must_use]
    pub fn timed_out(self) -> bool {
        self == Self::TimedOut
    }
}

#[derive(Debug)]
pub(crate) struct ProcessOutput {
    /// Everything written to stdout and stderr; interleaving is unspecified.
    pub combined: String,
    pub termination: Termination,
}

async fn forward_chunks<R>(mut reader: R, tx: mpsc::UnboundedSender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK_BYTES];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("Validator pipe read error: {e}");
                break;
            }
        }
    }
}

/// Run `binary` with `args`, optionally feeding `stdin_text`, and collect its
/// combined output. The child is killed once `kill_timeout` elapses.
pub(crate) async fn run_with_timeout(
    binary: &Path,
    args: Vec<OsString>,
    stdin_text: Option<String>,
    kill_timeout: Duration,
) -> Result<ProcessOutput, ValidationError> {
    let mut child = Command::new(binary)
        .args(&args)
        .stdin(if stdin_text.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ValidationError::SpawnFailed {
            binary: binary.to_path_buf(),
            source,
        })?;

    let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_chunks(stdout, chunk_tx.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_chunks(stderr, chunk_tx.clone())));
    }
    drop(chunk_tx);

    let writer = match (child.stdin.take(), stdin_text) {
        (Some(mut stdin), Some(text)) => Some(tokio::spawn(async move {
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                // the validator may exit before reading everything
                tracing::debug!("Validator stdin write failed: {e}");
            }
            // dropping `stdin` closes the pipe
        })),
        _ => None,
    };

    let termination = match tokio::time::timeout(kill_timeout, child.wait()).await {
        Ok(Ok(status)) => Termination::Exited(status.code()),
        Ok(Err(e)) => {
            tracing::warn!(binary = %binary.display(), "Waiting on validator failed: {e}");
            Termination::Exited(None)
        }
        Err(_) => {
            tracing::warn!(
                binary = %binary.display(),
                timeout_ms = kill_timeout.as_millis() as u64,
                "Killing validator process due to timeout"
            );
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill validator process: {e}");
            }
            Termination::TimedOut
        }
    };

    if let Some(writer) = writer {
        writer.abort();
    }
    for reader in &mut readers {
        if tokio::time::timeout(READER_GRACE, &mut *reader).await.is_err() {
            reader.abort();
        }
    }

    let mut bytes = Vec::new();
    while let Ok(chunk) = chunk_rx.try_recv() {
        bytes.extend_from_slice(&chunk);
    }

    Ok(ProcessOutput {
        combined: String::from_utf8_lossy(&bytes).into_owned(),
        termination,
    })
}
