use std::fmt;

use thiserror::Error;

use crate::task::TaskRegistry;

/// A step identifier that is neither a task name nor a command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step {index} ({identifier:?}) is blank")]
pub struct InvalidStep {
  pub index: usize,
  pub identifier: String,
}

/// One entry of a pipeline, interpreted once when the pipeline is planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
  /// Invoke the registered task with this name.
  Task { name: String },
  /// Run `program` with `args` inside the component's capsule.
  Command { program: String, args: Vec<String> },
}

impl Step {
  /// Interpret a step identifier.
  ///
  /// The identifier names a task when, trimmed, it matches a registered task.
  /// Anything else is a command line split on whitespace. There is no quoting:
  /// `sh -c "a b"` yields the arguments `-c`, `"a` and `b"`.
  pub fn parse(index: usize, identifier: &str, registry: &TaskRegistry) -> Result<Step, InvalidStep> {
    let trimmed = identifier.trim();
    if registry.contains(trimmed) {
      return Ok(Step::Task {
        name: trimmed.to_string(),
      });
    }

    let mut tokens = trimmed.split_whitespace().map(str::to_string);
    match tokens.next() {
      Some(program) => Ok(Step::Command {
        program,
        args: tokens.collect(),
      }),
      None => Err(InvalidStep {
        index,
        identifier: identifier.to_string(),
      }),
    }
  }

  pub fn is_task(&self) -> bool {
    matches!(self, Step::Task { .. })
  }
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Step::Task { name } => f.write_str(name),
      Step::Command { program, args } => {
        f.write_str(program)?;
        for arg in args {
          write!(f, " {}", arg)?;
        }
        Ok(())
      }
    }
  }
}
