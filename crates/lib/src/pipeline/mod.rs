//! Pipelines and steps.
//!
//! A pipeline is a named, ordered list of step identifiers declared in a
//! component's `run` section. Before execution each identifier is turned into
//! a tagged [`Step`]: a reference to a registered task, or a command line.

pub mod resolver;
pub mod step;

pub use resolver::{pipelines, plan, resolve};
pub use step::{InvalidStep, Step};
