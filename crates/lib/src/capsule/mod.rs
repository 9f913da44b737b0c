//! Isolated execution environments for component commands.
//!
//! A capsule runs one command at a time on behalf of a component and exposes
//! its output as an incremental byte stream plus a terminal exit status.
//!
//! # Submodules
//!
//! - [`local`] - Capsule backed by a local directory and a scrubbed process environment

pub mod local;
mod types;

pub use local::{CapsuleOptions, LocalCapsule};
pub use types::*;

use std::path::Path;

use async_trait::async_trait;

/// An execution environment a component's commands run in.
///
/// Implementations must return from [`exec`](Capsule::exec) as soon as the
/// process is started; completion is observed through the returned
/// [`ExecHandle`].
#[async_trait]
pub trait Capsule: Send + Sync {
  /// Working directory commands run in.
  fn root(&self) -> &Path;

  /// Start `command` with `args` inside the capsule.
  async fn exec(&self, command: &str, args: &[String]) -> Result<ExecHandle, CapsuleError>;
}
