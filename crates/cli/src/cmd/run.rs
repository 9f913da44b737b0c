//! Implementation of the `capsa run` command.
//!
//! Runs one pipeline on the modified and new components of the workspace, or on
//! the components named on the command line, and prints a per-component summary.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use capsa_lib::capsule::CapsuleOptions;
use capsa_lib::execute::ComponentReport;
use capsa_lib::sink::OutputSink;
use capsa_lib::workspace::ManifestWorkspace;
use capsa_lib::{ComponentId, Orchestrator, Outcome, RunOptions, RunReport, TaskRegistry};

use crate::output::{
  OutputFormat, format_duration, print_cancelled, print_failure, print_info, print_json, print_skipped, print_success,
};
use crate::signal::shutdown_signal;
use crate::sink::TerminalSink;

pub struct RunArgs {
  pub pipeline: String,
  pub components: Vec<String>,
  pub options: RunOptions,
  pub capsule: CapsuleOptions,
  pub output: OutputFormat,
}

#[derive(Serialize)]
struct ComponentSummary<'a> {
  id: &'a str,
  outcome: &'static str,
  duration_ms: u128,
  #[serde(skip_serializing_if = "Option::is_none")]
  failed_step: Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  step: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  exit_code: Option<i32>,
}

impl<'a> From<&'a ComponentReport> for ComponentSummary<'a> {
  fn from(report: &'a ComponentReport) -> Self {
    let mut summary = ComponentSummary {
      id: report.id().as_str(),
      outcome: report.outcome.label(),
      duration_ms: report.duration.as_millis(),
      failed_step: None,
      step: None,
      error: None,
      exit_code: None,
    };
    if let Outcome::Failed { step_index, step, cause } = &report.outcome {
      summary.failed_step = Some(*step_index);
      summary.step = Some(step);
      summary.error = Some(cause.to_string());
      summary.exit_code = cause.exit_code();
    }
    summary
  }
}

#[derive(Serialize)]
struct RunSummary<'a> {
  pipeline: &'a str,
  success: bool,
  succeeded: usize,
  failed: usize,
  skipped: usize,
  cancelled: usize,
  components: Vec<ComponentSummary<'a>>,
}

impl<'a> From<&'a RunReport> for RunSummary<'a> {
  fn from(report: &'a RunReport) -> Self {
    RunSummary {
      pipeline: &report.pipeline,
      success: report.is_success(),
      succeeded: report.succeeded(),
      failed: report.failed(),
      skipped: report.skipped(),
      cancelled: report.cancelled(),
      components: report.components.iter().map(ComponentSummary::from).collect(),
    }
  }
}

/// Execute the run command.
///
/// Exits the process with status 1 when any component failed or was cancelled.
pub fn cmd_run(workspace: &Path, args: RunArgs) -> Result<()> {
  let workspace = ManifestWorkspace::open(workspace)
    .context("Failed to open workspace")?
    .with_capsule_options(args.capsule);

  let sink: Arc<dyn OutputSink> = if args.output.is_json() {
    Arc::new(TerminalSink::stderr())
  } else {
    Arc::new(TerminalSink::stdout())
  };
  let orchestrator = Orchestrator::new(Arc::new(workspace), TaskRegistry::with_builtins()).with_sink(sink);

  let ids: Vec<ComponentId> = args.components.into_iter().map(ComponentId::from).collect();
  let ids = (!ids.is_empty()).then_some(ids.as_slice());

  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")?;

  let report = rt
    .block_on(async {
      let cancel = CancellationToken::new();
      let trigger = cancel.clone();
      let signals = tokio::spawn(async move {
        match shutdown_signal().await {
          Ok(()) => {
            warn!("interrupted, cancelling run");
            trigger.cancel();
          }
          Err(e) => warn!(error = %e, "failed to install signal handler"),
        }
      });

      let result = orchestrator
        .run_with_cancel(&args.pipeline, ids, &args.options, cancel)
        .await;
      signals.abort();
      result
    })
    .with_context(|| format!("Failed to run pipeline '{}'", args.pipeline))?;

  if args.output.is_json() {
    print_json(&RunSummary::from(&report))?;
  } else {
    print_report(&report);
  }

  if !report.is_success() {
    std::process::exit(1);
  }
  Ok(())
}

fn print_report(report: &RunReport) {
  println!();
  if report.total() == 0 {
    print_info("No components to run");
    return;
  }

  for component in &report.components {
    let duration = format_duration(component.duration);
    match &component.outcome {
      Outcome::Succeeded => print_success(&format!("{} ({})", component.id(), duration)),
      Outcome::Skipped => print_skipped(&format!("{} skipped", component.id())),
      Outcome::Cancelled => print_cancelled(&format!("{} cancelled ({})", component.id(), duration)),
      Outcome::Failed { step_index, step, cause } => print_failure(&format!(
        "{} failed at step {} '{}': {} ({})",
        component.id(),
        step_index,
        step,
        cause,
        duration
      )),
    }
  }

  println!();
  println!(
    "'{}': {} succeeded, {} failed, {} skipped, {} cancelled",
    report.pipeline,
    report.succeeded(),
    report.failed(),
    report.skipped(),
    report.cancelled()
  );
}
