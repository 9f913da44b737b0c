//! Built-in tasks.
//!
//! - `clean` removes the `dist/` directory inside the capsule root
//! - `describe` writes the component id and its declared pipelines to the output
//!
//! Both can be replaced by registering another task under the same name.

use tracing::debug;

use crate::pipeline;
use crate::task::{TaskContext, TaskRegistry, TaskResult};

/// Build output directory removed by `clean`, relative to the capsule root.
pub const DIST_DIR: &str = "dist";

pub fn register_builtins(registry: &mut TaskRegistry) {
  registry.register("clean", clean);
  registry.register("describe", describe);
}

async fn clean(ctx: TaskContext) -> TaskResult {
  let dist = ctx.root().join(DIST_DIR);
  match tokio::fs::remove_dir_all(&dist).await {
    Ok(()) => {
      ctx.write_line(&format!("removed {}", dist.display()));
      Ok(())
    }
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      debug!(component = %ctx.id(), path = ?dist, "nothing to clean");
      Ok(())
    }
    Err(e) => Err(e.into()),
  }
}

async fn describe(ctx: TaskContext) -> TaskResult {
  let pipelines = pipeline::pipelines(ctx.config()).join(", ");

  ctx.write_line(&format!("component {}", ctx.id()));
  ctx.write_line(&format!("pipelines: {}", if pipelines.is_empty() { "(none)" } else { pipelines.as_str() }));
  Ok(())
}
