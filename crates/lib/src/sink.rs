//! Output sinks.
//!
//! The pipeline core never formats anything itself. Raw command output and
//! structured status notices are handed to an [`OutputSink`]; the CLI renders
//! them to the terminal, [`TracingSink`] turns them into log events.

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::component::ComponentId;

/// Structured status event emitted while running a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
  /// A component's pipeline is about to run its first step.
  Started { component: ComponentId, pipeline: String },
  /// A step is about to be dispatched.
  Step {
    component: ComponentId,
    index: usize,
    step: String,
  },
  /// The component declares no such pipeline.
  Skipped { component: ComponentId, pipeline: String },
  /// Every step of the pipeline succeeded.
  Succeeded { component: ComponentId, pipeline: String },
  /// A step failed; later steps of this component will not run.
  Failed {
    component: ComponentId,
    index: usize,
    step: String,
    reason: String,
  },
  /// The run was cancelled before this component finished.
  Cancelled { component: ComponentId },
}

impl Notice {
  pub fn component(&self) -> &ComponentId {
    match self {
      Notice::Started { component, .. }
      | Notice::Step { component, .. }
      | Notice::Skipped { component, .. }
      | Notice::Succeeded { component, .. }
      | Notice::Failed { component, .. }
      | Notice::Cancelled { component } => component,
    }
  }
}

impl fmt::Display for Notice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Notice::Started { component, pipeline } => write!(f, "running '{}' for {}", pipeline, component),
      Notice::Step { component, index, step } => write!(f, "{} step {}: {}", component, index, step),
      Notice::Skipped { component, pipeline } => {
        write!(f, "skipping component {}, it has no defined '{}'", component, pipeline)
      }
      Notice::Succeeded { component, pipeline } => write!(f, "'{}' succeeded for {}", pipeline, component),
      Notice::Failed {
        component,
        index,
        step,
        reason,
      } => write!(f, "{} failed at step {} ({}): {}", component, index, step, reason),
      Notice::Cancelled { component } => write!(f, "{} cancelled", component),
    }
  }
}

/// Write-only destination for pipeline output.
///
/// Implementations are shared between concurrently running components and
/// must not block.
pub trait OutputSink: Send + Sync {
  /// Raw output produced by a step of `component`.
  fn output(&self, component: &ComponentId, chunk: &[u8]);

  /// A structured status notice.
  fn notice(&self, notice: &Notice);
}

/// Sink that forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutputSink for TracingSink {
  fn output(&self, component: &ComponentId, chunk: &[u8]) {
    let text = String::from_utf8_lossy(chunk);
    for line in text.lines() {
      debug!(component = %component, "{}", line);
    }
  }

  fn notice(&self, notice: &Notice) {
    match notice {
      Notice::Skipped { .. } | Notice::Cancelled { .. } => warn!(component = %notice.component(), "{}", notice),
      Notice::Failed { .. } => error!(component = %notice.component(), "{}", notice),
      Notice::Step { .. } => debug!(component = %notice.component(), "{}", notice),
      Notice::Started { .. } | Notice::Succeeded { .. } => info!(component = %notice.component(), "{}", notice),
    }
  }
}
