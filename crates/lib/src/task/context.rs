use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::capsule::Capsule;
use crate::component::{ComponentConfig, ComponentId, ResolvedComponent};
use crate::sink::OutputSink;

/// Context handed to a task callback for one (component, step) execution.
///
/// Cheap to clone; the component and sink are shared.
#[derive(Clone)]
pub struct TaskContext {
  component: Arc<ResolvedComponent>,
  pipeline: String,
  step_index: usize,
  sink: Arc<dyn OutputSink>,
}

impl TaskContext {
  pub fn new(
    component: Arc<ResolvedComponent>,
    pipeline: impl Into<String>,
    step_index: usize,
    sink: Arc<dyn OutputSink>,
  ) -> Self {
    Self {
      component,
      pipeline: pipeline.into(),
      step_index,
      sink,
    }
  }

  pub fn component(&self) -> &ResolvedComponent {
    &self.component
  }

  pub fn id(&self) -> &ComponentId {
    self.component.id()
  }

  pub fn config(&self) -> &ComponentConfig {
    self.component.config()
  }

  pub fn capsule(&self) -> &Arc<dyn Capsule> {
    &self.component.capsule
  }

  /// Directory the component's capsule runs commands in.
  pub fn root(&self) -> &Path {
    self.component.capsule.root()
  }

  /// Name of the pipeline being run.
  pub fn pipeline(&self) -> &str {
    &self.pipeline
  }

  /// Position of this step within the pipeline.
  pub fn step_index(&self) -> usize {
    self.step_index
  }

  /// Write raw output attributed to this component.
  pub fn output(&self, chunk: &[u8]) {
    self.sink.output(self.component.id(), chunk);
  }

  /// Write a line of text attributed to this component.
  pub fn write_line(&self, line: &str) {
    let mut chunk = String::with_capacity(line.len() + 1);
    chunk.push_str(line);
    chunk.push('\n');
    self.output(chunk.as_bytes());
  }
}

impl fmt::Debug for TaskContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskContext")
      .field("component", self.id())
      .field("pipeline", &self.pipeline)
      .field("step_index", &self.step_index)
      .finish()
  }
}
