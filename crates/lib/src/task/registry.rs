use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::task::TaskContext;

/// Error returned by a task callback.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

pub type TaskResult = Result<(), TaskError>;

pub type TaskFuture = Pin<Box<dyn Future<Output = TaskResult> + Send>>;

/// A registered task callback.
pub type TaskFn = Arc<dyn Fn(TaskContext) -> TaskFuture + Send + Sync>;

/// Mapping from task name to callback.
///
/// Registering a name twice replaces the earlier callback, which lets
/// extensions override built-in tasks.
#[derive(Clone, Default)]
pub struct TaskRegistry {
  tasks: HashMap<String, TaskFn>,
}

impl TaskRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry preloaded with the built-in tasks.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    crate::task::builtin::register_builtins(&mut registry);
    registry
  }

  /// Store `task` under `name`, replacing any previous callback.
  pub fn register<F, Fut>(&mut self, name: impl Into<String>, task: F)
  where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
  {
    let name = name.into();
    let task: TaskFn = Arc::new(move |ctx: TaskContext| -> TaskFuture { Box::pin(task(ctx)) });
    if self.tasks.insert(name.clone(), task).is_some() {
      debug!(task = %name, "task overridden");
    } else {
      debug!(task = %name, "task registered");
    }
  }

  pub fn lookup(&self, name: &str) -> Option<TaskFn> {
    self.tasks.get(name).cloned()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.tasks.contains_key(name)
  }

  /// Registered names, sorted.
  pub fn names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }
}

impl fmt::Debug for TaskRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskRegistry").field("tasks", &self.names()).finish()
  }
}
