use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use canopy_config::PipelineDef;
use canopy_resolver::{Resolver, ResolverConfig, StandardResolver};
use canopy_runner::{
  InstanceTree, PipelineRunner, RunError, RunEvent, RunNotifier, RunnerConfig, TaskDescriptor,
};

/// Canopy - run declarative task trees and render their output
#[derive(Parser)]
#[command(name = "canopy")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a pipeline and print its rendered output
  Run {
    /// Path to the pipeline file (JSON), or `-` for stdin
    pipeline_file: PathBuf,

    #[command(flatten)]
    limits: Limits,

    /// Print run events to stderr as JSON lines
    #[arg(long)]
    events: bool,

    /// Directory `command` work runs in
    #[arg(long)]
    working_dir: Option<PathBuf>,
  },

  /// Resolve and mount a pipeline without running it
  Validate {
    /// Path to the pipeline file (JSON), or `-` for stdin
    pipeline_file: PathBuf,

    #[command(flatten)]
    limits: Limits,
  },
}

#[derive(clap::Args)]
struct Limits {
  /// Maximum depth of the task tree
  #[arg(long, default_value_t = RunnerConfig::DEFAULT_MAX_DEPTH)]
  max_depth: usize,

  /// Reject composites that declare work instead of ignoring it
  #[arg(long)]
  strict: bool,
}

impl Limits {
  fn runner_config(&self) -> RunnerConfig {
    RunnerConfig {
      max_depth: self.max_depth,
      reject_composite_work: self.strict,
    }
  }
}

/// Writes each run event to stderr as one JSON line.
struct JsonLinesNotifier;

impl RunNotifier for JsonLinesNotifier {
  fn notify(&self, event: RunEvent) {
    match serde_json::to_string(&event) {
      Ok(line) => eprintln!("{}", line),
      Err(e) => warn!(error = %e, "failed to serialize run event"),
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Run {
      pipeline_file,
      limits,
      events,
      working_dir,
    }) => {
      let resolver = StandardResolver::new(ResolverConfig { working_dir });
      run_pipeline(&pipeline_file, &resolver, limits.runner_config(), events)?;
    }
    Some(Commands::Validate {
      pipeline_file,
      limits,
    }) => {
      validate_pipeline(&pipeline_file, limits.runner_config())?;
    }
    None => {
      println!("canopy - use --help to see available commands");
    }
  }

  Ok(())
}

fn run_pipeline(
  pipeline_file: &Path,
  resolver: &StandardResolver,
  config: RunnerConfig,
  events: bool,
) -> Result<()> {
  let pipeline = load_pipeline(pipeline_file)?;
  let tree = resolver
    .resolve(&pipeline)
    .context("failed to resolve pipeline")?;

  // Parallel children are spawned onto the runner's LocalSet; a current-thread
  // runtime is all the runner needs.
  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("failed to start runtime")?;

  let outcome = rt.block_on(async {
    if events {
      execute(PipelineRunner::with_notifier(config, JsonLinesNotifier), &tree).await
    } else {
      execute(PipelineRunner::new(config), &tree).await
    }
  });

  outcome.with_context(|| format!("pipeline '{}' failed", pipeline.name))
}

/// Run `tree`, report the outcome as soon as the root settles, then let any
/// detached work finish before the process exits.
async fn execute<N: RunNotifier + 'static>(
  runner: PipelineRunner<N>,
  tree: &TaskDescriptor,
) -> Result<(), RunError> {
  let outcome = runner.run(tree).await;
  if let Ok(output) = &outcome {
    println!("{}", output);
  }

  let in_flight = runner.in_flight();
  if in_flight > 0 {
    eprintln!(
      "Run {}; waiting for {} detached task(s) to finish",
      if outcome.is_ok() { "settled" } else { "failed" },
      in_flight
    );
  }
  runner.finish().await;

  outcome.map(|_| ())
}

fn validate_pipeline(pipeline_file: &Path, config: RunnerConfig) -> Result<()> {
  let pipeline = load_pipeline(pipeline_file)?;
  let tree = StandardResolver::default()
    .resolve(&pipeline)
    .context("failed to resolve pipeline")?;
  let instances = InstanceTree::mount(&tree, &config).context("failed to mount pipeline")?;

  eprintln!(
    "Pipeline '{}' is valid: {} tasks, depth {}",
    pipeline.name,
    instances.len(),
    tree.depth()
  );

  Ok(())
}

fn load_pipeline(pipeline_file: &Path) -> Result<PipelineDef> {
  let content = if pipeline_file == Path::new("-") {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read pipeline from stdin")?;
    input
  } else {
    std::fs::read_to_string(pipeline_file)
      .with_context(|| format!("failed to read pipeline file: {}", pipeline_file.display()))?
  };

  let pipeline = PipelineDef::from_json(&content)
    .with_context(|| format!("failed to parse pipeline file: {}", pipeline_file.display()))?;
  eprintln!(
    "Loaded pipeline: {} ({} tasks)",
    pipeline.name,
    pipeline.root.node_count()
  );

  Ok(pipeline)
}
