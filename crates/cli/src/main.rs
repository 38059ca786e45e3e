mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ensemble_lib::execute::ExecuteError;
use ensemble_lib::graph::GraphError;
use ensemble_lib::plan::PlanOptions;

use cmd::{RunOptions, cmd_components, cmd_env, cmd_graph, cmd_run};
use output::print_error;

/// Exit status for user errors and failed actions.
const EXIT_FAILURE: u8 = 1;
/// Exit status for a planning bug or a stalled scheduler.
const EXIT_INTERNAL: u8 = 2;
/// Conventional status for termination by SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

/// ensemble - plan and run builds of interdependent components
#[derive(Parser)]
#[command(name = "ensemble")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Path to the project file
  #[arg(short, long, global = true, default_value = "ensemble.json")]
  project: PathBuf,

  /// Directory holding build state (default: .ensemble next to the project file)
  #[arg(long, global = true)]
  state_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Args)]
struct PlanArgs {
  /// Targets to plan: `component` or `component@build`
  #[arg(required = true)]
  targets: Vec<String>,

  /// Only the requested targets, without their dependencies
  #[arg(long)]
  no_deps: bool,

  /// Run requested targets even if they are already done
  #[arg(short, long)]
  force: bool,
}

impl PlanArgs {
  fn options(&self) -> PlanOptions {
    PlanOptions {
      no_deps: self.no_deps,
      force: self.force,
    }
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Build the requested targets and everything they need
  Run {
    #[command(flatten)]
    plan: PlanArgs,

    /// Show what would run without running anything
    #[arg(long)]
    pretend: bool,

    /// Number of actions to run in parallel (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,
  },

  /// Print the resolved plan in Graphviz DOT format
  Graph {
    #[command(flatten)]
    plan: PlanArgs,
  },

  /// List components and their builds
  Components {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Print the environment a build runs with, as shell `export` lines
  Env {
    /// `component` or `component@build`
    target: String,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  // Logs go to stderr so `graph` output stays clean.
  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let project = cli.project.as_path();
  let state_dir = cli.state_dir.as_deref();

  let result = match &cli.command {
    Commands::Run { plan, pretend, jobs } => {
      let options = RunOptions {
        plan: plan.options(),
        pretend: *pretend,
        jobs: *jobs,
      };
      cmd_run(project, state_dir, &plan.targets, &options)
    }
    Commands::Graph { plan } => cmd_graph(project, state_dir, &plan.targets, &plan.options()).map(|()| ExitCode::SUCCESS),
    Commands::Components { json } => cmd_components(project, state_dir, *json).map(|()| ExitCode::SUCCESS),
    Commands::Env { target } => cmd_env(project, state_dir, target).map(|()| ExitCode::SUCCESS),
  };

  match result {
    Ok(code) => code,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::from(exit_status(&e))
    }
  }
}

fn exit_status(err: &anyhow::Error) -> u8 {
  if let Some(e) = err.downcast_ref::<ExecuteError>() {
    return match e {
      ExecuteError::Interrupted => EXIT_INTERRUPTED,
      ExecuteError::Stalled { .. } => EXIT_INTERNAL,
    };
  }
  if let Some(e) = err.downcast_ref::<GraphError>()
    && e.is_internal()
  {
    return EXIT_INTERNAL;
  }
  EXIT_FAILURE
}
