//! Executes a single pipeline step.
//!
//! A [`Step::Task`] invokes the registered callback; a [`Step::Command`] runs
//! the program in the component's capsule, streams its output to the sink, and
//! fails unless the process exits with status 0.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::capsule::ExecHandle;
use crate::consts::MAX_CAPTURED_OUTPUT;
use crate::execute::types::StepError;
use crate::pipeline::Step;
use crate::sink::OutputSink;
use crate::task::{TaskContext, TaskRegistry};
use crate::util::tail::TailBuffer;

/// Runs steps against a task registry and an output sink.
#[derive(Clone)]
pub struct StepExecutor {
  registry: Arc<TaskRegistry>,
  sink: Arc<dyn OutputSink>,
}

impl StepExecutor {
  pub fn new(registry: Arc<TaskRegistry>, sink: Arc<dyn OutputSink>) -> Self {
    Self { registry, sink }
  }

  /// Execute `step` for the component in `context`.
  ///
  /// Returns once the step has finished. When `cancel` fires first, an
  /// in-flight command is terminated and an in-flight task is aborted, and the
  /// step reports [`StepError::Cancelled`].
  pub async fn execute(&self, step: &Step, context: TaskContext, cancel: &CancellationToken) -> Result<(), StepError> {
    match step {
      Step::Task { name } => self.run_task(name, context, cancel).await,
      Step::Command { program, args } => self.run_command(step, program, args, context, cancel).await,
    }
  }

  async fn run_task(&self, name: &str, context: TaskContext, cancel: &CancellationToken) -> Result<(), StepError> {
    let task = self
      .registry
      .lookup(name)
      .ok_or_else(|| StepError::UnknownTask(name.to_string()))?;

    debug!(component = %context.id(), task = %name, "invoking task");

    // Own tokio task so a panicking callback fails the step instead of the run.
    let mut join = tokio::spawn(task(context));

    tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        join.abort();
        Err(StepError::Cancelled)
      }
      joined = &mut join => match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(StepError::Task {
          name: name.to_string(),
          source,
        }),
        Err(err) => Err(StepError::Task {
          name: name.to_string(),
          source: Box::new(err),
        }),
      },
    }
  }

  async fn run_command(
    &self,
    step: &Step,
    program: &str,
    args: &[String],
    context: TaskContext,
    cancel: &CancellationToken,
  ) -> Result<(), StepError> {
    let command = step.to_string();
    let id = context.id();

    debug!(component = %id, command = %command, "spawning command");

    let mut handle = context
      .capsule()
      .exec(program, args)
      .await
      .map_err(|source| StepError::Spawn {
        command: command.clone(),
        source,
      })?;

    let mut tail = TailBuffer::new(MAX_CAPTURED_OUTPUT);
    loop {
      let chunk = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        chunk = handle.next_chunk() => Some(chunk),
      };
      match chunk {
        None => return Err(terminate(&mut handle, &command).await),
        Some(Some(chunk)) => {
          self.sink.output(id, &chunk);
          tail.push(&chunk);
        }
        Some(None) => break,
      }
    }

    let exit = tokio::select! {
      biased;
      _ = cancel.cancelled() => None,
      exit = handle.wait() => Some(exit),
    };
    let exit = match exit {
      None => return Err(terminate(&mut handle, &command).await),
      Some(exit) => exit.map_err(|source| StepError::Supervision {
        command: command.clone(),
        source,
      })?,
    };

    trace!(component = %id, command = %command, exit = %exit, "command finished");

    if exit.success() {
      Ok(())
    } else {
      if tail.dropped() > 0 {
        debug!(component = %id, dropped = tail.dropped(), "captured output truncated");
      }
      Err(StepError::Exit {
        command,
        exit,
        output: tail.to_string_lossy(),
      })
    }
  }
}

/// Kill a running command and wait for it to go away.
async fn terminate(handle: &mut ExecHandle, command: &str) -> StepError {
  debug!(command = %command, "terminating command");
  handle.terminate();
  if let Err(err) = handle.wait().await {
    warn!(command = %command, error = %err, "command did not report exit after termination");
  }
  StepError::Cancelled
}
