//! Runs one pipeline across a selection of components.
//!
//! Components run concurrently, each on its own tokio task. Steps within a
//! component run strictly in order, each awaited before the next starts, and
//! the first failing step ends that component's pipeline. A failure never
//! affects other components.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::component::{ComponentId, ResolvedComponent};
use crate::execute::executor::StepExecutor;
use crate::execute::selector::ComponentSelector;
use crate::execute::types::{ComponentReport, Outcome, RunError, RunOptions, RunReport, StepError};
use crate::pipeline::{self, Step};
use crate::sink::{Notice, OutputSink, TracingSink};
use crate::task::{TaskContext, TaskRegistry, TaskResult};
use crate::workspace::{Workspace, WorkspaceError};

/// Entry point for pipeline runs.
///
/// Owns the task registry; tasks registered here are visible to every later
/// run. Each run gets its own snapshot of the registry.
pub struct Orchestrator {
  workspace: Arc<dyn Workspace>,
  registry: Arc<TaskRegistry>,
  sink: Arc<dyn OutputSink>,
}

impl Orchestrator {
  /// Orchestrator that reports through [`TracingSink`].
  pub fn new(workspace: Arc<dyn Workspace>, registry: TaskRegistry) -> Self {
    Self {
      workspace,
      registry: Arc::new(registry),
      sink: Arc::new(TracingSink),
    }
  }

  pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
    self.sink = sink;
    self
  }

  /// Register a task, replacing any task of the same name.
  pub fn register_task<F, Fut>(&mut self, name: impl Into<String>, task: F)
  where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
  {
    Arc::make_mut(&mut self.registry).register(name, task);
  }

  /// Run `pipeline` on the selected components.
  ///
  /// See [`run_with_cancel`](Self::run_with_cancel).
  pub async fn run(
    &self,
    pipeline: &str,
    ids: Option<&[ComponentId]>,
    options: &RunOptions,
  ) -> Result<RunReport, RunError> {
    self
      .run_with_cancel(pipeline, ids, options, CancellationToken::new())
      .await
  }

  /// Run `pipeline` on the selected components until done or `cancel` fires.
  ///
  /// Components are selected by [`ComponentSelector::select_for_build`] and
  /// resolved with one batched [`Workspace::load`]. Either step failing aborts
  /// the run before anything executes. Otherwise every selected component ends
  /// up in the report, in selection order, whatever happened to it.
  pub async fn run_with_cancel(
    &self,
    pipeline: &str,
    ids: Option<&[ComponentId]>,
    options: &RunOptions,
    cancel: CancellationToken,
  ) -> Result<RunReport, RunError> {
    info!(pipeline = %pipeline, parallelism = options.parallelism, "starting pipeline run");

    let selected = ComponentSelector::new(self.workspace.as_ref())
      .select_for_build(ids)
      .await?;
    if selected.is_empty() {
      info!(pipeline = %pipeline, "no components selected");
      return Ok(RunReport {
        pipeline: pipeline.to_string(),
        components: Vec::new(),
      });
    }

    let ids: Vec<ComponentId> = selected.into_iter().map(|component| component.id).collect();
    let components = self.resolve(&ids).await.map_err(RunError::Resolution)?;

    let timer = options.timeout.map(|timeout| {
      let cancel = cancel.clone();
      tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        warn!(timeout = ?timeout, "run timed out, cancelling");
        cancel.cancel();
      })
    });

    let semaphore = options.bound().map(|permits| Arc::new(Semaphore::new(permits)));
    let executor = StepExecutor::new(self.registry.clone(), self.sink.clone());

    let mut tasks = JoinSet::new();
    for (index, component) in components.iter().enumerate() {
      let run = ComponentRun {
        component: component.clone(),
        pipeline: pipeline.to_string(),
        registry: self.registry.clone(),
        executor: executor.clone(),
        sink: self.sink.clone(),
        semaphore: semaphore.clone(),
        cancel: cancel.clone(),
        progress: StepProgress::default(),
      };
      let progress = run.progress.clone();
      tasks.spawn(async move {
        let started = Instant::now();
        let id = run.id().clone();
        // Own task so a panic in the sink or a capsule fails only this component.
        let outcome = match tokio::spawn(run.execute()).await {
          Ok(outcome) => outcome,
          Err(err) => aborted(&id, &progress, err),
        };
        (index, outcome, started.elapsed())
      });
    }

    let mut finished: Vec<Option<(Outcome, Duration)>> = components.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok((index, outcome, duration)) => finished[index] = Some((outcome, duration)),
        // Only the wrapper task lands here; it does nothing that can panic.
        Err(err) => error!(error = %err, "component task did not complete"),
      }
    }

    if let Some(timer) = timer {
      timer.abort();
    }

    let report = RunReport {
      pipeline: pipeline.to_string(),
      components: components
        .into_iter()
        .zip(finished)
        .map(|(component, finished)| {
          let (outcome, duration) = finished.unwrap_or((Outcome::Cancelled, Duration::ZERO));
          ComponentReport {
            component,
            outcome,
            duration,
          }
        })
        .collect(),
    };

    info!(
      pipeline = %pipeline,
      succeeded = report.succeeded(),
      failed = report.failed(),
      skipped = report.skipped(),
      cancelled = report.cancelled(),
      "pipeline run complete"
    );

    Ok(report)
  }

  /// Load every id and return the components in the order of `ids`.
  async fn resolve(&self, ids: &[ComponentId]) -> Result<Vec<Arc<ResolvedComponent>>, WorkspaceError> {
    let mut loaded: HashMap<ComponentId, ResolvedComponent> = self
      .workspace
      .load(ids)
      .await?
      .into_iter()
      .map(|component| (component.id().clone(), component))
      .collect();

    ids
      .iter()
      .map(|id| {
        loaded
          .remove(id)
          .map(Arc::new)
          .ok_or_else(|| WorkspaceError::ComponentNotFound(id.clone()))
      })
      .collect()
  }
}

/// State moved into the tokio task that runs one component's pipeline.
struct ComponentRun {
  component: Arc<ResolvedComponent>,
  pipeline: String,
  registry: Arc<TaskRegistry>,
  executor: StepExecutor,
  sink: Arc<dyn OutputSink>,
  semaphore: Option<Arc<Semaphore>>,
  cancel: CancellationToken,
  progress: StepProgress,
}

/// Index and text of the step a component is currently running.
#[derive(Clone, Default)]
struct StepProgress(Arc<Mutex<(usize, String)>>);

impl StepProgress {
  fn enter(&self, index: usize, step: &Step) {
    *self.0.lock().unwrap_or_else(PoisonError::into_inner) = (index, step.to_string());
  }

  fn current(&self) -> (usize, String) {
    self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}

/// Outcome of a component whose task panicked instead of returning.
fn aborted(id: &ComponentId, progress: &StepProgress, err: JoinError) -> Outcome {
  let (step_index, step) = progress.current();
  error!(component = %id, step_index, error = %err, "component pipeline aborted");
  Outcome::Failed {
    step_index,
    step,
    cause: StepError::Aborted(err.to_string()),
  }
}

impl ComponentRun {
  fn id(&self) -> &ComponentId {
    self.component.id()
  }

  async fn execute(self) -> Outcome {
    let steps = match pipeline::plan(&self.component, &self.pipeline, &self.registry) {
      None => {
        self.sink.notice(&Notice::Skipped {
          component: self.id().clone(),
          pipeline: self.pipeline.clone(),
        });
        return Outcome::Skipped;
      }
      Some(Err(invalid)) => {
        let step = invalid.identifier.clone();
        return self.failed(invalid.index, step, invalid.into());
      }
      Some(Ok(steps)) => steps,
    };

    // Held until the pipeline ends.
    let _permit = match &self.semaphore {
      Some(semaphore) => {
        let permit = tokio::select! {
          biased;
          _ = self.cancel.cancelled() => None,
          permit = semaphore.clone().acquire_owned() => permit.ok(),
        };
        match permit {
          Some(permit) => Some(permit),
          None => return self.cancelled(),
        }
      }
      None => None,
    };

    if self.cancel.is_cancelled() {
      return self.cancelled();
    }

    self.sink.notice(&Notice::Started {
      component: self.id().clone(),
      pipeline: self.pipeline.clone(),
    });

    for (index, step) in steps.iter().enumerate() {
      if self.cancel.is_cancelled() {
        return self.cancelled();
      }
      if let Err(err) = self.run_step(index, step).await {
        return match err {
          StepError::Cancelled => self.cancelled(),
          cause => self.failed(index, step.to_string(), cause),
        };
      }
    }

    self.sink.notice(&Notice::Succeeded {
      component: self.id().clone(),
      pipeline: self.pipeline.clone(),
    });
    Outcome::Succeeded
  }

  async fn run_step(&self, index: usize, step: &Step) -> Result<(), StepError> {
    self.progress.enter(index, step);
    self.sink.notice(&Notice::Step {
      component: self.id().clone(),
      index,
      step: step.to_string(),
    });
    let context = TaskContext::new(self.component.clone(), self.pipeline.as_str(), index, self.sink.clone());
    self.executor.execute(step, context, &self.cancel).await
  }

  fn failed(&self, step_index: usize, step: String, cause: StepError) -> Outcome {
    debug!(component = %self.id(), step_index, error = ?cause, "step failed");
    self.sink.notice(&Notice::Failed {
      component: self.id().clone(),
      index: step_index,
      step: step.clone(),
      reason: cause.to_string(),
    });
    Outcome::Failed {
      step_index,
      step,
      cause,
    }
  }

  fn cancelled(&self) -> Outcome {
    self.sink.notice(&Notice::Cancelled {
      component: self.id().clone(),
    });
    Outcome::Cancelled
  }
}
