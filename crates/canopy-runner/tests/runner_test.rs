//! Integration tests for PipelineRunner::run.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use canopy_runner::{
  ChannelNotifier, Container, PipelineRunner, RunError, RunEvent, RunnerConfig, TaskDescriptor,
  TaskOptions, Work, WorkError,
};
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tokio::time::Instant;

/// Shared log of what tasks did, in the order they did it.
type Journal = Rc<RefCell<Vec<String>>>;

fn journal() -> Journal {
  Rc::new(RefCell::new(Vec::new()))
}

/// A leaf that records when it starts and finishes, resolving to `name`
/// after `delay_ms`.
fn recorded(name: &'static str, delay_ms: u64, journal: &Journal) -> TaskDescriptor {
  let journal = journal.clone();
  TaskDescriptor::leaf(Work::new(move || {
    journal.borrow_mut().push(format!("start {}", name));
    let journal = journal.clone();
    async move {
      tokio::time::sleep(Duration::from_millis(delay_ms)).await;
      journal.borrow_mut().push(format!("end {}", name));
      Ok(name.to_string())
    }
  }))
  .with_label(name)
}

/// A leaf that fails with `error` after `delay_ms`.
fn failing(error: &WorkError, delay_ms: u64) -> TaskDescriptor {
  let error = error.clone();
  TaskDescriptor::leaf(Work::new(move || {
    let error = error.clone();
    async move {
      tokio::time::sleep(Duration::from_millis(delay_ms)).await;
      Err(error)
    }
  }))
}

/// A leaf counting how often its work is invoked.
fn counted(calls: &Rc<Cell<usize>>) -> TaskDescriptor {
  let calls = calls.clone();
  TaskDescriptor::leaf(Work::effect(move || {
    calls.set(calls.get() + 1);
    async { Ok(()) }
  }))
}

fn assert_task_error(err: &RunError, expected: &WorkError) {
  let raised = err.work_error().expect("run should fail in a task");
  assert!(
    raised.ptr_eq(expected),
    "expected the raised error to propagate unchanged, got {}",
    raised
  );
}

#[tokio::test]
async fn test_executes_leaf_work() {
  let calls = Rc::new(Cell::new(0));
  let tree = TaskDescriptor::composite().with_child(counted(&calls));

  let output = PipelineRunner::default().run(&tree).await.unwrap();

  assert_eq!(output, "<div></div>");
  assert_eq!(calls.get(), 1);
}

#[tokio::test]
async fn test_renders_nested_composites() {
  let tree = TaskDescriptor::composite()
    .with_child(TaskDescriptor::composite().with_child(TaskDescriptor::composite()))
    .with_child(TaskDescriptor::composite());

  let output = PipelineRunner::default().run(&tree).await.unwrap();

  assert_eq!(output, "<div><div><div></div></div><div></div></div>");
}

#[tokio::test]
async fn test_noop_leaf_renders_empty() {
  let output = PipelineRunner::default()
    .run(&TaskDescriptor::new())
    .await
    .unwrap();
  assert_eq!(output, "");
}

#[tokio::test(start_paused = true)]
async fn test_parallel_children_all_start_before_any_finishes() {
  let finished = Rc::new(Cell::new(0));
  let sleeper = |delay_ms: u64| {
    let finished = finished.clone();
    TaskDescriptor::leaf(Work::effect(move || {
      assert_eq!(finished.get(), 0, "a sibling finished before this task started");
      let finished = finished.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        finished.set(finished.get() + 1);
        Ok(())
      }
    }))
  };
  let tree = TaskDescriptor::composite()
    .parallel()
    .with_child(sleeper(500))
    .with_child(sleeper(100));

  PipelineRunner::default().run(&tree).await.unwrap();

  assert_eq!(finished.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_renders_in_declared_order() {
  let journal = journal();
  let tree = TaskDescriptor::composite()
    .parallel()
    .with_child(recorded("a", 30, &journal))
    .with_child(recorded("b", 20, &journal))
    .with_child(recorded("c", 10, &journal));

  let output = PipelineRunner::default().run(&tree).await.unwrap();

  assert_eq!(output, "<div>abc</div>");
  assert_eq!(
    *journal.borrow(),
    vec!["start a", "start b", "start c", "end c", "end b", "end a"]
  );
}

#[tokio::test(start_paused = true)]
async fn test_sequential_runs_one_child_at_a_time() {
  let journal = journal();
  let tree = TaskDescriptor::composite()
    .with_child(recorded("a", 30, &journal))
    .with_child(recorded("b", 10, &journal));

  let output = PipelineRunner::default().run(&tree).await.unwrap();

  assert_eq!(output, "<div>ab</div>");
  assert_eq!(
    *journal.borrow(),
    vec!["start a", "end a", "start b", "end b"]
  );
}

#[tokio::test(start_paused = true)]
async fn test_parallel_group_starts_first_task_of_sequential_children() {
  let journal = journal();
  let lane = |first: &'static str, second: &'static str| {
    TaskDescriptor::new()
      .without_container()
      .with_child(recorded(first, 10, &journal))
      .with_child(recorded(second, 10, &journal))
  };
  let tree = TaskDescriptor::new()
    .without_container()
    .parallel()
    .with_child(lane("a1", "a2"))
    .with_child(lane("b1", "b2"));

  let output = PipelineRunner::default().run(&tree).await.unwrap();

  assert_eq!(output, "a1a2b1b2");
  assert_eq!(&journal.borrow()[..2], ["start a1", "start b1"]);
}

#[tokio::test]
async fn test_sequential_failure_skips_later_siblings() {
  let error = WorkError::msg("first child failed");
  let calls = Rc::new(Cell::new(0));
  let tree = TaskDescriptor::composite()
    .with_child(failing(&error, 0))
    .with_child(counted(&calls));

  let err = PipelineRunner::default().run(&tree).await.unwrap_err();

  assert_task_error(&err, &error);
  assert_eq!(err.to_string(), "first child failed");
  assert_eq!(calls.get(), 0);
}

#[tokio::test]
async fn test_failure_propagates_unchanged_to_root() {
  let error = WorkError::msg("deep failure");
  let tree = TaskDescriptor::composite().with_child(
    TaskDescriptor::composite()
      .parallel()
      .with_child(TaskDescriptor::composite().with_child(failing(&error, 0))),
  );

  let err = PipelineRunner::default().run(&tree).await.unwrap_err();

  assert_task_error(&err, &error);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_fails_with_first_observed_failure() {
  let slow = WorkError::msg("slow failure");
  let fast = WorkError::msg("fast failure");
  let tree = TaskDescriptor::composite()
    .parallel()
    .with_child(failing(&slow, 50))
    .with_child(failing(&fast, 10));

  let err = PipelineRunner::default().run(&tree).await.unwrap_err();

  assert_task_error(&err, &fast);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_failure_leaves_siblings_running() {
  let error = WorkError::msg("peer failed");
  let journal = journal();
  let tree = TaskDescriptor::composite()
    .parallel()
    .with_child(recorded("slow", 200, &journal))
    .with_child(failing(&error, 10));
  let runner = PipelineRunner::default();
  let started = Instant::now();

  let err = runner.run(&tree).await.unwrap_err();
  assert_task_error(&err, &error);
  assert!(started.elapsed() < Duration::from_millis(100));
  assert_eq!(*journal.borrow(), vec!["start slow"]);
  assert_eq!(runner.in_flight(), 1);

  runner.finish().await;
  assert_eq!(*journal.borrow(), vec!["start slow", "end slow"]);
}

#[tokio::test(start_paused = true)]
async fn test_one_shot_run_settles_before_detached_work() {
  let error = WorkError::msg("peer failed");
  let journal = journal();
  let tree = TaskDescriptor::composite()
    .parallel()
    .with_child(recorded("slow", 60_000, &journal))
    .with_child(failing(&error, 10));
  let local = LocalSet::new();
  let started = Instant::now();

  let err = local.run_until(canopy_runner::run(&tree)).await.unwrap_err();

  assert_task_error(&err, &error);
  assert!(started.elapsed() < Duration::from_millis(100));
  assert_eq!(*journal.borrow(), vec!["start slow"]);

  // The caller's LocalSet keeps driving the detached sibling.
  local.await;
  assert_eq!(*journal.borrow(), vec!["start slow", "end slow"]);
  assert!(started.elapsed() >= Duration::from_secs(60));
}

#[tokio::test]
async fn test_one_shot_run_renders_options_tree() {
  let composite = |children: Vec<TaskDescriptor>| {
    TaskDescriptor::from(TaskOptions {
      children,
      ..TaskOptions::default()
    })
  };
  let tree = composite(vec![composite(vec![composite(vec![])]), composite(vec![])]);

  let output = LocalSet::new()
    .run_until(canopy_runner::run(&tree))
    .await
    .unwrap();

  assert_eq!(output, "<div><div><div></div></div><div></div></div>");
}

#[tokio::test]
async fn test_builder_tree_renders_default_containers() {
  let tree = TaskDescriptor::new()
    .with_child(TaskDescriptor::new().with_child(TaskDescriptor::composite()))
    .with_child(TaskDescriptor::composite());

  let output = PipelineRunner::default().run(&tree).await.unwrap();

  assert_eq!(output, "<div><div><div></div></div><div></div></div>");
}

#[tokio::test]
async fn test_work_invoked_once_per_leaf_per_run() {
  let calls = Rc::new(Cell::new(0));
  let tree = TaskDescriptor::composite()
    .parallel()
    .with_child(counted(&calls))
    .with_child(TaskDescriptor::composite().with_child(counted(&calls)))
    .with_child(counted(&calls));
  let runner = PipelineRunner::default();

  runner.run(&tree).await.unwrap();
  assert_eq!(calls.get(), 3);

  runner.run(&tree).await.unwrap();
  assert_eq!(calls.get(), 6);
}

#[tokio::test]
async fn test_malformed_tree_runs_nothing() {
  let calls = Rc::new(Cell::new(0));
  let mut tree = counted(&calls);
  for _ in 0..3 {
    tree = TaskDescriptor::composite().with_child(tree);
  }
  let runner = PipelineRunner::new(RunnerConfig {
    max_depth: 2,
    ..RunnerConfig::default()
  });

  let err = runner.run(&tree).await.unwrap_err();

  match err {
    RunError::MalformedDescriptor { path, .. } => assert_eq!(path.to_string(), "/0/0/0"),
    other => panic!("expected malformed descriptor, got {:?}", other),
  }
  assert_eq!(calls.get(), 0);
}

#[tokio::test]
async fn test_composite_work_is_ignored() {
  let calls = Rc::new(Cell::new(0));
  let ignored = counted(&calls).work().cloned().unwrap();
  let tree = TaskDescriptor::composite()
    .with_work(ignored)
    .with_child(TaskDescriptor::leaf(Work::new(|| async {
      Ok("child".to_string())
    })));

  let output = PipelineRunner::default().run(&tree).await.unwrap();

  assert_eq!(output, "<div>child</div>");
  assert_eq!(calls.get(), 0);
}

#[tokio::test]
async fn test_custom_containers() {
  let item = |text: &'static str| {
    TaskDescriptor::leaf(Work::new(move || async move { Ok(text.to_string()) }))
      .with_container(Container::tag("li"))
  };
  let tree = TaskDescriptor::new()
    .with_container(Container::tag("ul"))
    .with_children([item("one"), item("two")]);

  let output = PipelineRunner::default().run(&tree).await.unwrap();

  assert_eq!(output, "<ul><li>one</li><li>two</li></ul>");
}

#[tokio::test(start_paused = true)]
async fn test_events_follow_execution_order() {
  let (sender, mut receiver) = mpsc::unbounded_channel();
  let journal = journal();
  let tree = TaskDescriptor::composite()
    .parallel()
    .with_child(recorded("a", 20, &journal))
    .with_child(recorded("b", 10, &journal));
  let runner =
    PipelineRunner::with_notifier(RunnerConfig::default(), ChannelNotifier::new(sender));

  runner.run(&tree).await.unwrap();

  let mut events = Vec::new();
  while let Ok(event) = receiver.try_recv() {
    events.push(event);
  }
  let summary: Vec<String> = events
    .iter()
    .map(|event| match event {
      RunEvent::RunStarted { .. } => "run_started".to_string(),
      RunEvent::TaskStarted { path, .. } => format!("started {}", path),
      RunEvent::TaskSucceeded { path, result, .. } => format!("succeeded {} {}", path, result),
      RunEvent::TaskFailed { path, .. } => format!("failed {}", path),
      RunEvent::RunCompleted { output, .. } => format!("run_completed {}", output),
      RunEvent::RunFailed { .. } => "run_failed".to_string(),
      RunEvent::RunAbandoned { .. } => "run_abandoned".to_string(),
    })
    .collect();

  assert_eq!(
    summary,
    vec![
      "run_started",
      "started /",
      "started /0",
      "started /1",
      "succeeded /1 b",
      "succeeded /0 a",
      "succeeded / <div>ab</div>",
      "run_completed <div>ab</div>",
    ]
  );
  assert!(matches!(
    &events[2],
    RunEvent::TaskStarted { label: Some(label), .. } if label == "a"
  ));
}

#[tokio::test(start_paused = true)]
async fn test_failed_run_reports_failing_path() {
  let (sender, mut receiver) = mpsc::unbounded_channel();
  let error = WorkError::msg("bad leaf");
  let tree = TaskDescriptor::composite()
    .with_child(TaskDescriptor::new())
    .with_child(failing(&error, 5));
  let runner =
    PipelineRunner::with_notifier(RunnerConfig::default(), ChannelNotifier::new(sender));

  runner.run(&tree).await.unwrap_err();

  let mut failed_paths = Vec::new();
  while let Ok(event) = receiver.try_recv() {
    if let RunEvent::TaskFailed { path, error, .. } = event {
      assert_eq!(error, "bad leaf");
      failed_paths.push(path);
    }
  }
  assert_eq!(failed_paths, vec!["/1", "/"]);
}
