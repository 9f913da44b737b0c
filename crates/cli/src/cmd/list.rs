//! Implementation of the `capsa list` command.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use capsa_lib::pipeline;
use capsa_lib::workspace::{ComponentEntry, ManifestWorkspace};

use crate::output::{OutputFormat, print_info, print_json, print_stat};

#[derive(Serialize)]
struct ComponentListing<'a> {
  id: &'a str,
  status: &'static str,
  path: String,
  pipelines: Vec<&'a str>,
}

impl<'a> From<&'a ComponentEntry> for ComponentListing<'a> {
  fn from(entry: &'a ComponentEntry) -> Self {
    ComponentListing {
      id: entry.id.as_str(),
      status: entry.status.as_str(),
      path: entry.relative_path().display().to_string(),
      pipelines: pipeline::pipelines(&entry.config),
    }
  }
}

pub fn cmd_list(workspace: &Path, output: OutputFormat) -> Result<()> {
  let workspace = ManifestWorkspace::open(workspace).context("Failed to open workspace")?;
  let listings: Vec<ComponentListing> = workspace.entries().iter().map(ComponentListing::from).collect();

  if output.is_json() {
    return print_json(&listings);
  }

  if listings.is_empty() {
    print_info("No components in workspace");
    return Ok(());
  }

  for listing in &listings {
    print_info(&format!("{} [{}]", listing.id, listing.status));
    print_stat("path", &listing.path);
    let pipelines = if listing.pipelines.is_empty() {
      "(none)".to_string()
    } else {
      listing.pipelines.join(", ")
    };
    print_stat("pipelines", &pipelines);
  }

  Ok(())
}
