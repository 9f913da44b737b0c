//! In-process tasks.
//!
//! A pipeline step that names a registered task runs the task's callback
//! instead of spawning a command. Extensions register their tasks on a
//! [`TaskRegistry`] before a run starts.
//!
//! # Submodules
//!
//! - [`builtin`] - Tasks available in every registry created with [`TaskRegistry::with_builtins`]
//! - [`context`] - The per-step [`TaskContext`] handed to callbacks
//! - [`registry`] - Name to callback mapping

pub mod builtin;
pub mod context;
pub mod registry;

pub use context::TaskContext;
pub use registry::{TaskError, TaskFn, TaskFuture, TaskRegistry, TaskResult};
