//! Manifest-backed workspace.
//!
//! Components are declared in a `capsa.json` file at the workspace root:
//!
//! ```json
//! {
//!   "components": [
//!     {
//!       "id": "ui/button",
//!       "path": "components/button",
//!       "status": "modified",
//!       "config": { "run": { "build": ["compile", "./pack.sh"] } }
//!     }
//!   ]
//! }
//! ```
//!
//! `path` defaults to the id, `status` to `clean`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::capsule::{CapsuleOptions, LocalCapsule};
use crate::component::{Component, ComponentConfig, ComponentId, ResolvedComponent};
use crate::consts::WORKSPACE_FILE;
use crate::workspace::{Workspace, WorkspaceError};

/// Change state of a component as tracked by the workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
  #[default]
  Clean,
  Modified,
  New,
}

impl ComponentStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ComponentStatus::Clean => "clean",
      ComponentStatus::Modified => "modified",
      ComponentStatus::New => "new",
    }
  }
}

/// One component declaration in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
  pub id: ComponentId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<PathBuf>,
  #[serde(default)]
  pub status: ComponentStatus,
  #[serde(default)]
  pub config: ComponentConfig,
}

impl ComponentEntry {
  /// Directory of the component relative to the workspace root.
  pub fn relative_path(&self) -> PathBuf {
    self.path.clone().unwrap_or_else(|| PathBuf::from(self.id.as_str()))
  }

  pub fn to_component(&self) -> Component {
    Component::new(self.id.clone(), self.config.clone())
  }
}

/// Contents of `capsa.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceManifest {
  #[serde(default)]
  pub components: Vec<ComponentEntry>,
}

/// Workspace whose components are listed in a manifest file.
#[derive(Debug, Clone)]
pub struct ManifestWorkspace {
  root: PathBuf,
  manifest: WorkspaceManifest,
  capsule_options: CapsuleOptions,
}

impl ManifestWorkspace {
  /// Read `capsa.json` from `root`.
  pub fn open(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
    let root = root.as_ref();
    let root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let path = root.join(WORKSPACE_FILE);

    let content = std::fs::read_to_string(&path).map_err(|source| WorkspaceError::ReadManifest {
      path: path.clone(),
      source,
    })?;
    let manifest: WorkspaceManifest =
      serde_json::from_str(&content).map_err(|e| WorkspaceError::InvalidManifest {
        path: path.clone(),
        message: e.to_string(),
      })?;

    info!(path = ?path, components = manifest.components.len(), "loaded workspace manifest");

    Self::from_manifest(root, manifest)
  }

  /// Build a workspace from an in-memory manifest.
  pub fn from_manifest(root: impl Into<PathBuf>, manifest: WorkspaceManifest) -> Result<Self, WorkspaceError> {
    let root = root.into();
    let manifest_path = root.join(WORKSPACE_FILE);

    let mut seen = HashSet::new();
    for entry in &manifest.components {
      if !seen.insert(&entry.id) {
        return Err(WorkspaceError::InvalidManifest {
          path: manifest_path,
          message: format!("duplicate component id '{}'", entry.id),
        });
      }
      if !stays_inside(&entry.relative_path()) {
        return Err(WorkspaceError::InvalidManifest {
          path: manifest_path,
          message: format!("component '{}' path must stay inside the workspace", entry.id),
        });
      }
    }

    Ok(Self {
      root,
      manifest,
      capsule_options: CapsuleOptions::default(),
    })
  }

  pub fn with_capsule_options(mut self, options: CapsuleOptions) -> Self {
    self.capsule_options = options;
    self
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn entries(&self) -> &[ComponentEntry] {
    &self.manifest.components
  }

  fn entry(&self, id: &ComponentId) -> Result<&ComponentEntry, WorkspaceError> {
    self
      .manifest
      .components
      .iter()
      .find(|entry| &entry.id == id)
      .ok_or_else(|| WorkspaceError::ComponentNotFound(id.clone()))
  }

  fn with_status(&self, status: ComponentStatus) -> Vec<Component> {
    self
      .manifest
      .components
      .iter()
      .filter(|entry| entry.status == status)
      .map(ComponentEntry::to_component)
      .collect()
  }
}

/// Relative, and never climbs above its starting directory.
fn stays_inside(path: &Path) -> bool {
  path
    .components()
    .all(|component| matches!(component, std::path::Component::Normal(_) | std::path::Component::CurDir))
}

#[async_trait]
impl Workspace for ManifestWorkspace {
  async fn modified(&self) -> Result<Vec<Component>, WorkspaceError> {
    Ok(self.with_status(ComponentStatus::Modified))
  }

  async fn new_components(&self) -> Result<Vec<Component>, WorkspaceError> {
    Ok(self.with_status(ComponentStatus::New))
  }

  async fn get_many(&self, ids: &[ComponentId]) -> Result<Vec<Component>, WorkspaceError> {
    ids.iter().map(|id| self.entry(id).map(ComponentEntry::to_component)).collect()
  }

  async fn load(&self, ids: &[ComponentId]) -> Result<Vec<ResolvedComponent>, WorkspaceError> {
    let entries = ids.iter().map(|id| self.entry(id)).collect::<Result<Vec<_>, _>>()?;

    let mut resolved = Vec::with_capacity(entries.len());
    for entry in entries {
      let capsule_root = self.root.join(entry.relative_path());
      let is_dir = tokio::fs::metadata(&capsule_root)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
      if !is_dir {
        return Err(WorkspaceError::Capsule {
          component: entry.id.clone(),
          message: format!("directory {} does not exist", capsule_root.display()),
        });
      }

      debug!(component = %entry.id, root = ?capsule_root, "resolved component");
      let capsule = LocalCapsule::new(entry.id.clone(), capsule_root, self.capsule_options.clone());
      resolved.push(ResolvedComponent::new(entry.to_component(), Arc::new(capsule)));
    }

    Ok(resolved)
  }
}
