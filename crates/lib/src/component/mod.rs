//! Components and their declared configuration.
//!
//! A [`Component`] is what the workspace hands out when asked which units need
//! building. Once the workspace attaches a capsule to it, it becomes a
//! [`ResolvedComponent`], the value the orchestrator works with for the
//! duration of one run.

mod types;

pub use types::*;
