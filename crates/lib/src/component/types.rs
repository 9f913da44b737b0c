use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::capsule::Capsule;

/// Pipeline name -> ordered step identifiers, as declared in a component's `run` section.
pub type PipelineConfig = BTreeMap<String, Vec<String>>;

/// Identifier of a component within a workspace (e.g. `ui/button`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub String);

impl ComponentId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ComponentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for ComponentId {
  fn from(id: &str) -> Self {
    Self(id.to_string())
  }
}

impl From<String> for ComponentId {
  fn from(id: String) -> Self {
    Self(id)
  }
}

/// Declared configuration of a component.
///
/// Only the `run` section is interpreted here. Every other key is kept as an
/// opaque JSON value under `extensions` so that tasks can read their own
/// settings from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
  /// Pipelines declared by the component. `None` when the section is absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub run: Option<PipelineConfig>,

  /// Remaining configuration keys.
  #[serde(flatten)]
  pub extensions: BTreeMap<String, serde_json::Value>,
}

impl ComponentConfig {
  /// Config with the given pipelines and no extensions.
  pub fn with_pipelines<I, K, S>(pipelines: I) -> Self
  where
    I: IntoIterator<Item = (K, Vec<S>)>,
    K: Into<String>,
    S: Into<String>,
  {
    let run = pipelines
      .into_iter()
      .map(|(name, steps)| (name.into(), steps.into_iter().map(Into::into).collect()))
      .collect();
    Self {
      run: Some(run),
      extensions: BTreeMap::new(),
    }
  }

  /// Look up an extension setting by key.
  pub fn extension(&self, key: &str) -> Option<&serde_json::Value> {
    self.extensions.get(key)
  }
}

/// A unit of source code selected for a build run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
  pub id: ComponentId,
  #[serde(default)]
  pub config: ComponentConfig,
}

impl Component {
  pub fn new(id: impl Into<ComponentId>, config: ComponentConfig) -> Self {
    Self { id: id.into(), config }
  }
}

/// A component paired with the capsule its commands run in.
///
/// Produced by [`Workspace::load`](crate::workspace::Workspace::load) at the
/// start of a run. The capsule is shared, not owned: the workspace decides its
/// lifetime.
#[derive(Clone)]
pub struct ResolvedComponent {
  pub component: Component,
  pub capsule: Arc<dyn Capsule>,
}

impl ResolvedComponent {
  pub fn new(component: Component, capsule: Arc<dyn Capsule>) -> Self {
    Self { component, capsule }
  }

  pub fn id(&self) -> &ComponentId {
    &self.component.id
  }

  pub fn config(&self) -> &ComponentConfig {
    &self.component.config
  }
}

impl fmt::Debug for ResolvedComponent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResolvedComponent")
      .field("component", &self.component)
      .field("capsule", &self.capsule.root())
      .finish()
  }
}
