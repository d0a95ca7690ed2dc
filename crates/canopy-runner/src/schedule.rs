//! Task scheduling.
//!
//! [`start`] begins executing an instance and returns a future for the rest of
//! its execution. The instance transitions to running and its work callable is
//! invoked inside `start` itself, which is what lets a parallel composite begin
//! every child before it yields. Only the callable's synchronous part runs
//! there; an `async` body it returns first runs when the future is polled.
//!
//! - leaf: invoke the work once, then await it
//! - sequential composite: start the first child now, the rest one at a time
//! - parallel composite: start every child now and spawn each onto the
//!   `LocalSet`, then wait for them together
//!
//! Spawned children are never aborted. When a parallel composite fails, the
//! siblings still in flight keep running detached and their outcomes are
//! discarded. [`InFlight`] counts the spawned children that have not finished.

#[cfg(test)]
use std::cell::Ref;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use canopy_task::{Mode, Work, WorkError};
use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info};

use crate::events::{RunEvent, RunNotifier};
use crate::instance::{InstanceId, InstanceTree, TaskInstance, TaskPath, TaskState};
use crate::render::{render, render_leaf};

/// What a task needs once it has begun running.
struct Started {
  mode: Mode,
  work: Option<Work>,
  children: Vec<InstanceId>,
}

/// Count of spawned children that have not finished yet.
#[derive(Debug, Clone, Default)]
pub(crate) struct InFlight(Rc<Cell<usize>>);

impl InFlight {
  pub(crate) fn count(&self) -> usize {
    self.0.get()
  }

  /// Count `future` as in flight from now until it completes or is dropped.
  fn track<F: Future>(self, future: F) -> impl Future<Output = F::Output> {
    self.0.set(self.0.get() + 1);
    let guard = InFlightGuard(self);
    async move {
      let _guard = guard;
      future.await
    }
  }
}

struct InFlightGuard(InFlight);

impl Drop for InFlightGuard {
  fn drop(&mut self) {
    let counter = &(self.0).0;
    counter.set(counter.get() - 1);
  }
}

/// State shared by every future of one run.
pub(crate) struct RunState<N> {
  run_id: String,
  tree: RefCell<InstanceTree>,
  notifier: Rc<N>,
  in_flight: InFlight,
}

impl<N: RunNotifier> RunState<N> {
  pub(crate) fn new(
    run_id: String,
    tree: InstanceTree,
    notifier: Rc<N>,
    in_flight: InFlight,
  ) -> Self {
    Self {
      run_id,
      tree: RefCell::new(tree),
      notifier,
      in_flight,
    }
  }

  #[cfg(test)]
  pub(crate) fn tree(&self) -> Ref<'_, InstanceTree> {
    self.tree.borrow()
  }

  /// The root's rendered result, once it has succeeded.
  pub(crate) fn output(&self) -> String {
    let tree = self.tree.borrow();
    tree.get(tree.root()).result().unwrap_or_default().to_owned()
  }

  fn begin(&self, id: InstanceId) -> Started {
    let (started, path, label) = {
      let mut tree = self.tree.borrow_mut();
      let instance = tree.get_mut(id);
      instance.begin();
      let started = Started {
        mode: instance.mode(),
        work: instance.work().cloned(),
        children: instance.children().to_vec(),
      };
      (
        started,
        instance.path().to_string(),
        instance.label().map(str::to_owned),
      )
    };

    info!(
      run_id = %self.run_id,
      path = %path,
      mode = ?started.mode,
      children = started.children.len(),
      "task_started"
    );
    self.notifier.notify(RunEvent::TaskStarted {
      run_id: self.run_id.clone(),
      path,
      label,
    });

    started
  }

  fn complete_leaf(
    &self,
    id: InstanceId,
    outcome: Result<String, WorkError>,
  ) -> Result<(), WorkError> {
    match outcome {
      Ok(fragment) => {
        let result = {
          let tree = self.tree.borrow();
          render_leaf(tree.get(id).container(), &fragment)
        };
        self.succeed(id, result);
        Ok(())
      }
      Err(e) => {
        self.fail(id, &e);
        Err(e)
      }
    }
  }

  fn complete_composite(
    &self,
    id: InstanceId,
    outcome: Result<(), WorkError>,
  ) -> Result<(), WorkError> {
    match outcome {
      Ok(()) => {
        let result = render(&self.tree.borrow(), id);
        self.succeed(id, result);
        Ok(())
      }
      Err(e) => {
        self.fail(id, &e);
        Err(e)
      }
    }
  }

  fn succeed(&self, id: InstanceId, result: String) {
    let path = self.settle(id, |instance| instance.succeed(result.clone()));

    info!(
      run_id = %self.run_id,
      path = %path,
      result_len = result.len(),
      "task_completed"
    );
    debug!(run_id = %self.run_id, path = %path, result = %result, "task_result");
    self.notifier.notify(RunEvent::TaskSucceeded {
      run_id: self.run_id.clone(),
      path: path.to_string(),
      result,
    });
  }

  fn fail(&self, id: InstanceId, e: &WorkError) {
    let path = self.settle(id, |instance| instance.fail(e.clone()));

    error!(
      run_id = %self.run_id,
      path = %path,
      error = %e,
      "task_failed"
    );
    self.notifier.notify(RunEvent::TaskFailed {
      run_id: self.run_id.clone(),
      path: path.to_string(),
      error: e.to_string(),
    });
  }

  /// Apply a terminal transition and report where it happened.
  fn settle(
    &self,
    id: InstanceId,
    apply: impl FnOnce(&mut TaskInstance),
  ) -> TaskPath {
    let mut tree = self.tree.borrow_mut();
    let parent_state = tree.get(id).parent().map(|parent| tree.get(parent).state());
    let instance = tree.get_mut(id);
    apply(instance);

    if parent_state.is_some_and(TaskState::is_terminal) {
      debug!(
        run_id = %self.run_id,
        path = %instance.path(),
        "task settled after its parent; outcome discarded"
      );
    }

    instance.path().clone()
  }
}

/// Begin executing `id` and return a future that settles once it has.
///
/// Must be called from within the run's `LocalSet`.
pub(crate) fn start<N: RunNotifier + 'static>(
  state: &Rc<RunState<N>>,
  id: InstanceId,
) -> LocalBoxFuture<'static, Result<(), WorkError>> {
  let started = state.begin(id);

  if started.children.is_empty() {
    return start_leaf(state, id, started.work);
  }

  match started.mode {
    Mode::Sequential => start_sequential(state, id, started.children),
    Mode::Parallel => start_parallel(state, id, started.children),
  }
}

fn start_leaf<N: RunNotifier + 'static>(
  state: &Rc<RunState<N>>,
  id: InstanceId,
  work: Option<Work>,
) -> LocalBoxFuture<'static, Result<(), WorkError>> {
  let Some(work) = work else {
    return future::ready(state.complete_leaf(id, Ok(String::new()))).boxed_local();
  };

  let pending = work.invoke();
  let state = Rc::clone(state);
  async move {
    let outcome = pending.await;
    state.complete_leaf(id, outcome)
  }
  .boxed_local()
}

fn start_sequential<N: RunNotifier + 'static>(
  state: &Rc<RunState<N>>,
  id: InstanceId,
  children: Vec<InstanceId>,
) -> LocalBoxFuture<'static, Result<(), WorkError>> {
  let mut remaining = children.into_iter();
  let first = remaining.next().map(|child| start(state, child));
  let state = Rc::clone(state);
  async move {
    let outcome = run_in_order(&state, first, remaining).await;
    state.complete_composite(id, outcome)
  }
  .boxed_local()
}

async fn run_in_order<N: RunNotifier + 'static>(
  state: &Rc<RunState<N>>,
  first: Option<LocalBoxFuture<'static, Result<(), WorkError>>>,
  remaining: impl Iterator<Item = InstanceId>,
) -> Result<(), WorkError> {
  if let Some(first) = first {
    first.await?;
  }
  for child in remaining {
    start(state, child).await?;
  }
  Ok(())
}

fn start_parallel<N: RunNotifier + 'static>(
  state: &Rc<RunState<N>>,
  id: InstanceId,
  children: Vec<InstanceId>,
) -> LocalBoxFuture<'static, Result<(), WorkError>> {
  let pending: FuturesUnordered<JoinHandle<Result<(), WorkError>>> = children
    .into_iter()
    .map(|child| task::spawn_local(state.in_flight.clone().track(start(state, child))))
    .collect();
  let state = Rc::clone(state);
  async move {
    let outcome = first_failure(pending).await;
    state.complete_composite(id, outcome)
  }
  .boxed_local()
}

/// Wait for every child, returning early on the first failure observed.
/// Dropping the remaining handles detaches those children; it does not abort
/// them.
async fn first_failure(
  mut pending: FuturesUnordered<JoinHandle<Result<(), WorkError>>>,
) -> Result<(), WorkError> {
  while let Some(joined) = pending.next().await {
    match joined {
      Ok(Ok(())) => {}
      Ok(Err(e)) => return Err(e),
      Err(join_error) if join_error.is_panic() => {
        std::panic::resume_unwind(join_error.into_panic())
      }
      Err(join_error) => return Err(WorkError::new(join_error)),
    }
  }
  Ok(())
}
