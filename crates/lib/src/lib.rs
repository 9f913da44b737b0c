//! capsa-lib: pipeline execution core for component workspaces
//!
//! This crate provides the building blocks for running named pipelines
//! ("build", "test", ...) across the components of a workspace:
//! - `Component`: a unit of source with an id and declared configuration
//! - `Capsule`: an isolated environment that runs a component's commands
//! - `TaskRegistry`: in-process task callbacks that steps can reference
//! - `Orchestrator`: selects, resolves and runs component pipelines concurrently

pub mod capsule;
pub mod component;
pub mod consts;
pub mod execute;
pub mod pipeline;
pub mod sink;
pub mod task;
pub mod util;
pub mod workspace;

pub use component::{Component, ComponentConfig, ComponentId, ResolvedComponent};
pub use execute::{Orchestrator, Outcome, RunError, RunOptions, RunReport};
pub use task::{TaskContext, TaskRegistry};
