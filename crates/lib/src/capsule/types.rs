use std::fmt;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Errors raised by a capsule while starting or supervising a command.
#[derive(Debug, Error)]
pub enum CapsuleError {
  /// The process could not be started.
  #[error("failed to spawn {command}: {source}")]
  Spawn {
    command: String,
    #[source]
    source: std::io::Error,
  },

  /// I/O error while preparing the capsule or waiting on the process.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The supervisor went away without reporting an exit status.
  #[error("process supervisor exited without reporting a status")]
  Lost,
}

/// Terminal status of a command run in a capsule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
  /// Exit code, `None` when the process was terminated by a signal.
  pub code: Option<i32>,
}

impl ProcessExit {
  pub fn from_code(code: i32) -> Self {
    Self { code: Some(code) }
  }

  pub fn signalled() -> Self {
    Self { code: None }
  }

  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

impl From<std::process::ExitStatus> for ProcessExit {
  fn from(status: std::process::ExitStatus) -> Self {
    Self { code: status.code() }
  }
}

impl fmt::Display for ProcessExit {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.code {
      Some(code) => write!(f, "exit code {}", code),
      None => f.write_str("terminated by signal"),
    }
  }
}

/// Handle to a command running in a capsule.
///
/// Output arrives in chunks through [`next_chunk`](Self::next_chunk), which
/// returns `None` once every output stream of the process has closed. The exit
/// status is then available from [`wait`](Self::wait).
pub struct ExecHandle {
  output: mpsc::Receiver<Bytes>,
  exit: Option<oneshot::Receiver<Result<ProcessExit, CapsuleError>>>,
  terminate: Option<oneshot::Sender<()>>,
}

impl ExecHandle {
  pub fn new(
    output: mpsc::Receiver<Bytes>,
    exit: oneshot::Receiver<Result<ProcessExit, CapsuleError>>,
    terminate: oneshot::Sender<()>,
  ) -> Self {
    Self {
      output,
      exit: Some(exit),
      terminate: Some(terminate),
    }
  }

  /// Next chunk of combined stdout/stderr output.
  pub async fn next_chunk(&mut self) -> Option<Bytes> {
    self.output.recv().await
  }

  /// Ask the capsule to kill the process. Calling it twice is a no-op.
  pub fn terminate(&mut self) {
    if let Some(tx) = self.terminate.take() {
      // The supervisor may already be gone if the process just exited.
      let _ = tx.send(());
    }
  }

  /// Wait for the process to exit. Output not yet consumed is discarded.
  ///
  /// Cancel safe: dropping the future before it completes leaves the handle
  /// usable. Once the status has been returned, later calls report
  /// [`CapsuleError::Lost`].
  pub async fn wait(&mut self) -> Result<ProcessExit, CapsuleError> {
    self.output.close();
    let exit = self.exit.as_mut().ok_or(CapsuleError::Lost)?;
    let result = exit.await;
    self.exit = None;
    result.map_err(|_| CapsuleError::Lost)?
  }
}

impl fmt::Debug for ExecHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExecHandle")
      .field("terminated", &self.terminate.is_none())
      .finish()
  }
}
