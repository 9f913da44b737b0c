mod cmd;
mod output;
mod signal;
mod sink;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use capsa_lib::RunOptions;
use capsa_lib::capsule::CapsuleOptions;

use crate::cmd::RunArgs;
use crate::output::OutputFormat;

/// capsa - Run pipelines across the components of a workspace
#[derive(Parser)]
#[command(name = "capsa")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Workspace root containing capsa.json
  #[arg(short, long, global = true, env = "CAPSA_WORKSPACE", default_value = ".")]
  workspace: PathBuf,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a pipeline on modified and new components, or on the given ones
  Run {
    /// Pipeline name (e.g. build, test)
    pipeline: String,

    /// Components to run instead of the modified and new ones
    components: Vec<String>,

    /// Maximum number of components running at once (0 = unbounded)
    #[arg(short = 'j', long, env = "CAPSA_PARALLELISM", default_value_t = 0)]
    parallelism: usize,

    /// Cancel the run after this long (e.g. 90s, 5m)
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Extra environment variable for every command (repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_var)]
    env: Vec<(String, String)>,

    /// Do not pass the host PATH to commands
    #[arg(long)]
    no_inherit_path: bool,

    /// Summary format
    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// List the components of the workspace
  List {
    /// Listing format
    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Run {
      pipeline,
      components,
      parallelism,
      timeout,
      env,
      no_inherit_path,
      output,
    } => cmd::cmd_run(
      &cli.workspace,
      RunArgs {
        pipeline,
        components,
        options: RunOptions { parallelism, timeout },
        capsule: CapsuleOptions {
          inherit_path: !no_inherit_path,
          env: env.into_iter().collect(),
        },
        output,
      },
    ),
    Commands::List { output } => cmd::cmd_list(&cli.workspace, output),
  }
}

/// Parse a `KEY=VALUE` pair for `--env`.
fn parse_env_var(s: &str) -> Result<(String, String), String> {
  let (key, value) = s
    .split_once('=')
    .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
  if key.is_empty() {
    return Err(format!("missing variable name in '{}'", s));
  }
  Ok((key.to_string(), value.to_string()))
}
