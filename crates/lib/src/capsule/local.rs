//! Local directory capsule.
//!
//! Runs commands directly (no shell) in the component's directory with an
//! isolated environment:
//! - Clears all environment variables
//! - Inherits PATH from the host (or sets /path-not-set when disabled)
//! - Sets HOME to a capsule-local directory
//! - Sets TMPDIR/TMP/TEMP/TEMPDIR to a capsule-local temp directory
//! - Sets CAPSA_COMPONENT to the component id
//! - Merges user-specified environment variables
//!
//! On unix each command leads its own process group, so terminating it also
//! kills anything it started in the background.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::capsule::{Capsule, CapsuleError, ExecHandle, ProcessExit};
use crate::component::ComponentId;
use crate::consts::{CAPSULE_STATE_DIR, SOURCE_DATE_EPOCH};

const OUTPUT_CHANNEL_CAPACITY: usize = 64;
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Environment settings applied to every command of a capsule.
#[derive(Debug, Clone)]
pub struct CapsuleOptions {
  /// Pass the host PATH through. When false, PATH is set to `/path-not-set`
  /// so that commands must be referenced by absolute or relative path.
  pub inherit_path: bool,

  /// Extra environment variables, applied last.
  pub env: BTreeMap<String, String>,
}

impl Default for CapsuleOptions {
  fn default() -> Self {
    Self {
      inherit_path: true,
      env: BTreeMap::new(),
    }
  }
}

/// Capsule rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalCapsule {
  component: ComponentId,
  root: PathBuf,
  options: CapsuleOptions,
}

impl LocalCapsule {
  pub fn new(component: ComponentId, root: impl Into<PathBuf>, options: CapsuleOptions) -> Self {
    Self {
      component,
      root: root.into(),
      options,
    }
  }

  fn state_dir(&self) -> PathBuf {
    self.root.join(CAPSULE_STATE_DIR)
  }

  /// Relative paths such as `./pack.sh` name files inside the capsule root;
  /// bare names are looked up on PATH.
  fn program_path(&self, program: &str) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
      self.root.join(path)
    } else {
      path.to_path_buf()
    }
  }

  fn command(&self, program: &str, args: &[String], home_dir: &Path, tmp_dir: &Path) -> Command {
    let mut command = Command::new(self.program_path(program));
    command
      .args(args)
      .current_dir(&self.root)
      .env_clear()
      .env("HOME", home_dir)
      .env("TMPDIR", tmp_dir)
      .env("TMP", tmp_dir)
      .env("TEMP", tmp_dir)
      .env("TEMPDIR", tmp_dir)
      .env("LANG", "C")
      .env("LC_ALL", "C")
      .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH)
      .env("CAPSA_COMPONENT", self.component.as_str())
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());

    match std::env::var_os("PATH") {
      Some(path) if self.options.inherit_path => {
        command.env("PATH", path);
      }
      _ => {
        command.env("PATH", "/path-not-set");
      }
    }

    for (key, value) in &self.options.env {
      command.env(key, value);
    }

    #[cfg(unix)]
    command.process_group(0);

    command
  }
}

#[async_trait]
impl Capsule for LocalCapsule {
  fn root(&self) -> &Path {
    &self.root
  }

  async fn exec(&self, program: &str, args: &[String]) -> Result<ExecHandle, CapsuleError> {
    info!(component = %self.component, cmd = %program, ?args, "executing command");

    let state_dir = self.state_dir();
    let home_dir = state_dir.join("home");
    let tmp_dir = state_dir.join("tmp");
    tokio::fs::create_dir_all(&home_dir).await?;
    tokio::fs::create_dir_all(&tmp_dir).await?;

    debug!(working_dir = ?self.root, "spawning process");

    let mut child = self
      .command(program, args, &home_dir, &tmp_dir)
      .spawn()
      .map_err(|source| CapsuleError::Spawn {
        command: program.to_string(),
        source,
      })?;

    let (out_tx, out_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
    let (exit_tx, exit_rx) = oneshot::channel();
    let (term_tx, mut term_rx) = oneshot::channel::<()>();

    let mut readers = JoinSet::new();
    if let Some(stdout) = child.stdout.take() {
      readers.spawn(forward_output(stdout, out_tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
      readers.spawn(forward_output(stderr, out_tx));
    }

    let component = self.component.clone();
    let group = child.id();
    tokio::spawn(async move {
      let mut terminated = false;
      let status = tokio::select! {
        status = child.wait() => status,
        Ok(()) = &mut term_rx => {
          terminated = true;
          kill(&mut child, group, &component);
          child.wait().await
        }
      };

      // Background descendants can hold the pipes open after the process
      // exits; a termination request still has to get through.
      if !terminated {
        terminated = tokio::select! {
          _ = drain(&mut readers) => false,
          Ok(()) = &mut term_rx => true,
        };
        if let (true, Some(group)) = (terminated, group) {
          debug!(component = %component, "terminating leftover processes");
          kill_group(group, &component);
        }
      }

      if terminated {
        readers.shutdown().await;
      }

      let _ = exit_tx.send(status.map(ProcessExit::from).map_err(CapsuleError::Io));
    });

    Ok(ExecHandle::new(out_rx, exit_rx, term_tx))
  }
}

/// Kill a running process together with its process group.
fn kill(child: &mut Child, group: Option<u32>, component: &ComponentId) {
  debug!(component = %component, "terminating process");
  if let Some(group) = group {
    kill_group(group, component);
  }
  if let Err(e) = child.start_kill() {
    warn!(component = %component, error = %e, "failed to kill process");
  }
}

#[cfg(unix)]
fn kill_group(group: u32, component: &ComponentId) {
  use rustix::io::Errno;
  use rustix::process::{Pid, Signal, kill_process_group};

  let Some(pid) = i32::try_from(group).ok().and_then(Pid::from_raw) else {
    return;
  };
  match kill_process_group(pid, Signal::KILL) {
    // Nothing left in the group.
    Ok(()) | Err(Errno::SRCH) => {}
    Err(e) => warn!(component = %component, error = %e, "failed to kill process group"),
  }
}

#[cfg(not(unix))]
fn kill_group(_group: u32, _component: &ComponentId) {}

async fn drain(readers: &mut JoinSet<()>) {
  while readers.join_next().await.is_some() {}
}

/// Copy a process stream into the output channel until EOF.
///
/// Keeps draining after the receiver is gone so the process never blocks on a
/// full pipe.
async fn forward_output<R>(mut reader: R, tx: mpsc::Sender<Bytes>)
where
  R: AsyncRead + Unpin,
{
  let mut buf = vec![0u8; READ_BUFFER_SIZE];
  loop {
    match reader.read(&mut buf).await {
      Ok(0) => break,
      Ok(n) => {
        if !tx.is_closed() {
          let _ = tx.send(Bytes::copy_from_slice(&buf[..n])).await;
        }
      }
      Err(e) => {
        debug!(error = %e, "output stream read failed");
        break;
      }
    }
  }
}
