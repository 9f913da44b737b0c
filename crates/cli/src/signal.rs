//! Signal handling for run cancellation.

use tracing::info;

/// Wait for an interrupt (SIGINT or SIGTERM on Unix, Ctrl-C elsewhere).
#[cfg(unix)]
pub async fn shutdown_signal() -> std::io::Result<()> {
  use tokio::signal::unix::{SignalKind, signal};

  let mut sigint = signal(SignalKind::interrupt())?;
  let mut sigterm = signal(SignalKind::terminate())?;

  tokio::select! {
    _ = sigint.recv() => {
      info!(signal = "SIGINT", "signal received");
    }
    _ = sigterm.recv() => {
      info!(signal = "SIGTERM", "signal received");
    }
  }
  Ok(())
}

#[cfg(not(unix))]
pub async fn shutdown_signal() -> std::io::Result<()> {
  tokio::signal::ctrl_c().await?;
  info!(signal = "ctrl-c", "signal received");
  Ok(())
}
