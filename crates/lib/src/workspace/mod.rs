//! Workspace collaborator.
//!
//! The workspace knows which components exist, which of them changed, and how
//! to attach a capsule to each. The pipeline core only consumes it through the
//! [`Workspace`] trait.
//!
//! # Submodules
//!
//! - [`manifest`] - Workspace backed by a `capsa.json` manifest file

pub mod manifest;

pub use manifest::{ComponentEntry, ComponentStatus, ManifestWorkspace, WorkspaceManifest};

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::component::{Component, ComponentId, ResolvedComponent};

/// Errors reported by a workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
  /// The requested component does not exist.
  #[error("component not found: {0}")]
  ComponentNotFound(ComponentId),

  /// The workspace manifest could not be read.
  #[error("failed to read workspace manifest {path}: {source}")]
  ReadManifest {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The workspace manifest is not valid.
  #[error("invalid workspace manifest {path}: {message}")]
  InvalidManifest { path: PathBuf, message: String },

  /// A component's capsule could not be prepared.
  #[error("failed to prepare capsule for {component}: {message}")]
  Capsule { component: ComponentId, message: String },
}

/// Source of components and their capsules.
#[async_trait]
pub trait Workspace: Send + Sync {
  /// Components changed since they were last built.
  async fn modified(&self) -> Result<Vec<Component>, WorkspaceError>;

  /// Components that were never built.
  async fn new_components(&self) -> Result<Vec<Component>, WorkspaceError>;

  /// Components by id, in the order requested. Fails on the first unknown id.
  async fn get_many(&self, ids: &[ComponentId]) -> Result<Vec<Component>, WorkspaceError>;

  /// Attach a capsule and materialized configuration to every id.
  ///
  /// This is a batched call; it either resolves every id or fails.
  async fn load(&self, ids: &[ComponentId]) -> Result<Vec<ResolvedComponent>, WorkspaceError>;
}
