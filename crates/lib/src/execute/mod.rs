//! Pipeline execution.
//!
//! This module turns a pipeline name and a component selection into running
//! work. It handles:
//! - Choosing components ([`ComponentSelector`])
//! - Executing one step, task or command ([`StepExecutor`])
//! - Running every component's pipeline under a parallelism bound ([`Orchestrator`])
//! - Cancellation and timeouts

pub mod executor;
pub mod orchestrator;
pub mod selector;
pub mod types;

pub use executor::StepExecutor;
pub use orchestrator::Orchestrator;
pub use selector::{ComponentSelector, SelectionError};
pub use types::{ComponentReport, Outcome, RunError, RunOptions, RunReport, StepError};
