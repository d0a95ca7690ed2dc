//! Pipeline runner.

use std::rc::Rc;

use canopy_task::TaskDescriptor;
use tokio::task::LocalSet;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::RunnerConfig;
use crate::error::RunError;
use crate::events::{NoopNotifier, RunEvent, RunNotifier};
use crate::instance::InstanceTree;
use crate::schedule::{self, InFlight, RunState};

/// Executes task trees.
///
/// Each call to [`run`](PipelineRunner::run) mounts a fresh instance tree, so
/// one runner can execute the same descriptor any number of times. Work is
/// driven on the runner's own `LocalSet` on the calling thread.
///
/// A run returns as soon as its root settles. Siblings of a failed parallel
/// task are not aborted: they stay on the runner and make progress whenever it
/// is driven again. Call [`finish`](PipelineRunner::finish) to run them to
/// completion. Dropping the runner while [`in_flight`](PipelineRunner::in_flight)
/// is non-zero drops that work unfinished.
pub struct PipelineRunner<N: RunNotifier = NoopNotifier> {
  config: RunnerConfig,
  notifier: Rc<N>,
  local: LocalSet,
  in_flight: InFlight,
}

impl PipelineRunner<NoopNotifier> {
  /// Create a runner that discards run events.
  pub fn new(config: RunnerConfig) -> Self {
    Self::with_notifier(config, NoopNotifier)
  }
}

impl Default for PipelineRunner<NoopNotifier> {
  fn default() -> Self {
    Self::new(RunnerConfig::default())
  }
}

impl<N: RunNotifier + 'static> PipelineRunner<N> {
  /// Create a runner that reports run events to `notifier`.
  pub fn with_notifier(config: RunnerConfig, notifier: N) -> Self {
    Self {
      config,
      notifier: Rc::new(notifier),
      local: LocalSet::new(),
      in_flight: InFlight::default(),
    }
  }

  /// Run `root` to completion.
  ///
  /// Resolves with the root's rendered output, or fails with the first error
  /// that reached the root. A task failure is returned as the exact error the
  /// failing task raised.
  pub async fn run(&self, root: &TaskDescriptor) -> Result<String, RunError> {
    execute_run(
      root,
      &self.config,
      &self.notifier,
      &self.in_flight,
      Some(&self.local),
    )
    .await
  }

  /// Detached tasks from earlier runs that have not finished yet.
  pub fn in_flight(&self) -> usize {
    self.in_flight.count()
  }

  /// Drive every task still in flight from earlier runs to completion.
  pub async fn finish(mut self) {
    std::mem::take(&mut self.local).await;
  }

  pub fn config(&self) -> &RunnerConfig {
    &self.config
  }
}

impl<N: RunNotifier> Drop for PipelineRunner<N> {
  fn drop(&mut self) {
    let in_flight = self.in_flight.count();
    if in_flight > 0 {
      warn!(in_flight, "runner dropped before detached tasks finished");
    }
  }
}

/// Run `root` once with the default configuration.
///
/// Unlike [`PipelineRunner::run`], parallel children are spawned onto the
/// caller's `LocalSet`. The returned future resolves as soon as the root
/// settles; siblings left running by a failed parallel group stay on the
/// caller's `LocalSet` and finish whenever it is driven.
///
/// # Panics
///
/// Like [`tokio::task::spawn_local`], panics if the tree contains a parallel
/// composite and this is not polled from within a `LocalSet`.
pub async fn run(root: &TaskDescriptor) -> Result<String, RunError> {
  execute_run(
    root,
    &RunnerConfig::default(),
    &Rc::new(NoopNotifier),
    &InFlight::default(),
    None,
  )
  .await
}

/// Execute one run inside its span and scope. Without a `local`, parallel
/// children are spawned onto the `LocalSet` currently being driven.
async fn execute_run<N: RunNotifier + 'static>(
  root: &TaskDescriptor,
  config: &RunnerConfig,
  notifier: &Rc<N>,
  in_flight: &InFlight,
  local: Option<&LocalSet>,
) -> Result<String, RunError> {
  let run_id = uuid::Uuid::new_v4().to_string();
  let span = info_span!("pipeline_run", run_id = %run_id);

  async {
    let scope = RunScope::acquire(run_id.clone(), Rc::clone(notifier));
    let outcome = execute(root, config, notifier, in_flight, local, run_id).await;
    scope.settle(&outcome);
    outcome
  }
  .instrument(span)
  .await
}

async fn execute<N: RunNotifier + 'static>(
  root: &TaskDescriptor,
  config: &RunnerConfig,
  notifier: &Rc<N>,
  in_flight: &InFlight,
  local: Option<&LocalSet>,
  run_id: String,
) -> Result<String, RunError> {
  let tree = InstanceTree::mount(root, config)?;
  info!(run_id = %run_id, instances = tree.len(), "tree_mounted");

  let root_id = tree.root();
  let state = Rc::new(RunState::new(
    run_id,
    tree,
    Rc::clone(notifier),
    in_flight.clone(),
  ));

  // Started inside the polled future so parallel children are spawned onto
  // whichever `LocalSet` is driving it.
  let settled = async { schedule::start(&state, root_id).await };
  match local {
    Some(local) => local.run_until(settled).await?,
    None => settled.await?,
  }

  Ok(state.output())
}

/// Scope of a single run.
///
/// Acquired when a run starts and released on every exit path. If the run
/// future is dropped or unwinds before settling, dropping the scope still
/// closes the run with [`RunEvent::RunAbandoned`].
struct RunScope<N: RunNotifier> {
  run_id: String,
  notifier: Rc<N>,
  settled: bool,
}

impl<N: RunNotifier> RunScope<N> {
  fn acquire(run_id: String, notifier: Rc<N>) -> Self {
    info!(run_id = %run_id, "run_started");
    notifier.notify(RunEvent::RunStarted {
      run_id: run_id.clone(),
    });

    Self {
      run_id,
      notifier,
      settled: false,
    }
  }

  fn settle(mut self, outcome: &Result<String, RunError>) {
    self.settled = true;
    let run_id = self.run_id.clone();

    match outcome {
      Ok(output) => {
        info!(run_id = %run_id, "run_completed");
        self.notifier.notify(RunEvent::RunCompleted {
          run_id,
          output: output.clone(),
        });
      }
      Err(e) => {
        error!(run_id = %run_id, error = %e, "run_failed");
        self.notifier.notify(RunEvent::RunFailed {
          run_id,
          error: e.to_string(),
        });
      }
    }
  }
}

impl<N: RunNotifier> Drop for RunScope<N> {
  fn drop(&mut self) {
    if !self.settled {
      warn!(run_id = %self.run_id, "run_abandoned");
      self.notifier.notify(RunEvent::RunAbandoned {
        run_id: self.run_id.clone(),
      });
    }
  }
}
