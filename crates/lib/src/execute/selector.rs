//! Choosing which components a run builds.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, warn};

use crate::component::{Component, ComponentId};
use crate::workspace::{Workspace, WorkspaceError};

#[derive(Debug, Error)]
pub enum SelectionError {
  /// An explicitly requested component does not exist in the workspace.
  #[error("component not found: {0}")]
  NotFound(ComponentId),

  #[error(transparent)]
  Workspace(WorkspaceError),
}

impl From<WorkspaceError> for SelectionError {
  fn from(err: WorkspaceError) -> Self {
    match err {
      WorkspaceError::ComponentNotFound(id) => SelectionError::NotFound(id),
      other => SelectionError::Workspace(other),
    }
  }
}

/// Picks the components a pipeline runs on.
pub struct ComponentSelector<'a> {
  workspace: &'a dyn Workspace,
}

impl<'a> ComponentSelector<'a> {
  pub fn new(workspace: &'a dyn Workspace) -> Self {
    Self { workspace }
  }

  /// Components to build.
  ///
  /// With explicit ids, exactly those components in the given order; an unknown
  /// id fails the whole selection. Without ids, every modified component
  /// followed by every new one. A component listed twice is kept once, at its
  /// first position.
  pub async fn select_for_build(&self, ids: Option<&[ComponentId]>) -> Result<Vec<Component>, SelectionError> {
    let selected = match ids {
      Some(ids) => self.workspace.get_many(ids).await?,
      None => {
        let mut components = self.workspace.modified().await?;
        components.extend(self.workspace.new_components().await?);
        components
      }
    };

    let selected = dedup(selected);
    debug!(count = selected.len(), explicit = ids.is_some(), "components selected");
    Ok(selected)
  }
}

fn dedup(components: Vec<Component>) -> Vec<Component> {
  let mut seen = HashSet::new();
  components
    .into_iter()
    .filter(|component| {
      let first = seen.insert(component.id.clone());
      if !first {
        warn!(component = %component.id, "component selected more than once, keeping first");
      }
      first
    })
    .collect()
}
