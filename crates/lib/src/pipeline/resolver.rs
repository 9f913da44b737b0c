//! Pipeline lookup in a component's configuration.

use crate::component::{ComponentConfig, ResolvedComponent};
use crate::pipeline::{InvalidStep, Step};
use crate::task::TaskRegistry;

/// Step identifiers of `pipeline` as declared by the component.
///
/// Returns `None` when the component has no `run` section or the section has
/// no entry for `pipeline`. A declared but empty pipeline is `Some(&[])`.
pub fn resolve<'a>(component: &'a ResolvedComponent, pipeline: &str) -> Option<&'a [String]> {
  component
    .config()
    .run
    .as_ref()
    .and_then(|run| run.get(pipeline))
    .map(Vec::as_slice)
}

/// Names of the pipelines declared in `config`, sorted.
pub fn pipelines(config: &ComponentConfig) -> Vec<&str> {
  config
    .run
    .as_ref()
    .map(|run| run.keys().map(String::as_str).collect())
    .unwrap_or_default()
}

/// Resolve `pipeline` and interpret every identifier against `registry`.
///
/// `None` means the pipeline is not declared; `Some(Err(_))` reports the first
/// identifier that cannot be interpreted.
pub fn plan(
  component: &ResolvedComponent,
  pipeline: &str,
  registry: &TaskRegistry,
) -> Option<Result<Vec<Step>, InvalidStep>> {
  let identifiers = resolve(component, pipeline)?;
  Some(
    identifiers
      .iter()
      .enumerate()
      .map(|(index, identifier)| Step::parse(index, identifier, registry))
      .collect(),
  )
}
