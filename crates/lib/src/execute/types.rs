//! Types for pipeline execution.
//!
//! This module defines the error types, outcomes and run configuration used
//! when executing a pipeline across the components of a workspace.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::capsule::{CapsuleError, ProcessExit};
use crate::component::{ComponentId, ResolvedComponent};
use crate::execute::selector::SelectionError;
use crate::pipeline::InvalidStep;
use crate::task::TaskError;
use crate::workspace::WorkspaceError;

/// Errors that end a single step, and with it the component's pipeline.
#[derive(Debug, Error)]
pub enum StepError {
  /// A task callback returned an error.
  #[error("task '{name}' failed: {source}")]
  Task {
    name: String,
    #[source]
    source: TaskError,
  },

  /// The task was registered when the pipeline was planned but is gone now.
  #[error("task '{0}' is not registered")]
  UnknownTask(String),

  /// The command could not be started in the capsule.
  #[error("failed to start '{command}': {source}")]
  Spawn {
    command: String,
    #[source]
    source: CapsuleError,
  },

  /// The capsule lost track of a running command.
  #[error("lost track of '{command}': {source}")]
  Supervision {
    command: String,
    #[source]
    source: CapsuleError,
  },

  /// The command exited unsuccessfully.
  #[error("'{command}' failed with {exit}")]
  Exit {
    command: String,
    exit: ProcessExit,
    /// Trailing output of the command.
    output: String,
  },

  /// The step identifier could not be interpreted.
  #[error(transparent)]
  Invalid(#[from] InvalidStep),

  /// The component's pipeline panicked outside a task callback, e.g. in the
  /// output sink.
  #[error("pipeline aborted: {0}")]
  Aborted(String),

  /// The run was cancelled while the step was in flight.
  #[error("cancelled")]
  Cancelled,
}

impl StepError {
  /// Exit code of a failed command, if the step was a command that exited.
  pub fn exit_code(&self) -> Option<i32> {
    match self {
      StepError::Exit { exit, .. } => exit.code,
      _ => None,
    }
  }

  /// Captured output of a failed command.
  pub fn output(&self) -> Option<&str> {
    match self {
      StepError::Exit { output, .. } => Some(output),
      _ => None,
    }
  }
}

/// Errors that abort a whole run before any component is built.
#[derive(Debug, Error)]
pub enum RunError {
  #[error("component selection failed: {0}")]
  Selection(#[from] SelectionError),

  #[error("failed to resolve components: {0}")]
  Resolution(#[source] WorkspaceError),
}

/// What happened to one component during a run.
#[derive(Debug)]
pub enum Outcome {
  /// The component declares no such pipeline.
  Skipped,
  /// Every step succeeded.
  Succeeded,
  /// Step `step_index` failed; later steps did not run.
  Failed {
    step_index: usize,
    step: String,
    cause: StepError,
  },
  /// The run was cancelled before the component finished.
  Cancelled,
}

impl Outcome {
  pub fn label(&self) -> &'static str {
    match self {
      Outcome::Skipped => "skipped",
      Outcome::Succeeded => "succeeded",
      Outcome::Failed { .. } => "failed",
      Outcome::Cancelled => "cancelled",
    }
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, Outcome::Failed { .. })
  }
}

/// Outcome of one component, with the component it belongs to.
#[derive(Debug)]
pub struct ComponentReport {
  pub component: Arc<ResolvedComponent>,
  pub outcome: Outcome,
  /// Time spent on the component, including waiting for a parallelism slot.
  pub duration: Duration,
}

impl ComponentReport {
  pub fn id(&self) -> &ComponentId {
    self.component.id()
  }
}

/// Result of running a pipeline, one entry per selected component in selection order.
#[derive(Debug, Default)]
pub struct RunReport {
  pub pipeline: String,
  pub components: Vec<ComponentReport>,
}

impl RunReport {
  /// True when no component failed or was cancelled.
  pub fn is_success(&self) -> bool {
    self
      .components
      .iter()
      .all(|report| matches!(report.outcome, Outcome::Succeeded | Outcome::Skipped))
  }

  pub fn outcome_of(&self, id: &ComponentId) -> Option<&Outcome> {
    self
      .components
      .iter()
      .find(|report| report.id() == id)
      .map(|report| &report.outcome)
  }

  pub fn succeeded(&self) -> usize {
    self.count(|o| matches!(o, Outcome::Succeeded))
  }

  pub fn skipped(&self) -> usize {
    self.count(|o| matches!(o, Outcome::Skipped))
  }

  pub fn failed(&self) -> usize {
    self.count(Outcome::is_failed)
  }

  pub fn cancelled(&self) -> usize {
    self.count(|o| matches!(o, Outcome::Cancelled))
  }

  pub fn total(&self) -> usize {
    self.components.len()
  }

  fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
    self.components.iter().filter(|report| pred(&report.outcome)).count()
  }
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
  /// Maximum number of components with an in-flight pipeline. 0 means unbounded.
  pub parallelism: usize,

  /// Cancel the run once this much time has passed.
  pub timeout: Option<Duration>,
}

impl RunOptions {
  pub fn with_parallelism(parallelism: usize) -> Self {
    Self {
      parallelism,
      ..Self::default()
    }
  }

  /// The parallelism bound, `None` when unbounded.
  pub fn bound(&self) -> Option<usize> {
    (self.parallelism > 0).then_some(self.parallelism)
  }
}
