//! Live task instances, mounted from descriptors.
//!
//! Mounting walks the descriptor tree top-down and allocates every instance of
//! a run up front into one arena. Instances refer to each other by
//! [`InstanceId`], which is the instance's pre-order position.

use std::fmt;

use canopy_task::{Container, Mode, TaskDescriptor, Work, WorkError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RunnerConfig;
use crate::error::RunError;

/// Index of an instance within its [`InstanceTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(usize);

impl InstanceId {
  pub fn index(self) -> usize {
    self.0
  }
}

/// Position of an instance in the tree: the child index taken at each level.
///
/// Displays as `/` for the root and `/0/2` for the third child of the root's
/// first child.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TaskPath(Vec<usize>);

impl TaskPath {
  pub fn root() -> Self {
    Self(Vec::new())
  }

  pub fn child(&self, index: usize) -> Self {
    let mut indices = self.0.clone();
    indices.push(index);
    Self(indices)
  }

  /// Number of levels below the root.
  pub fn depth(&self) -> usize {
    self.0.len()
  }

  pub fn indices(&self) -> &[usize] {
    &self.0
  }
}

impl fmt::Display for TaskPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.0.is_empty() {
      return f.write_str("/");
    }
    for index in &self.0 {
      write!(f, "/{}", index)?;
    }
    Ok(())
  }
}

/// Lifecycle of a task instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
  Idle,
  Running,
  Succeeded,
  Failed,
}

impl TaskState {
  pub fn is_terminal(self) -> bool {
    matches!(self, TaskState::Succeeded | TaskState::Failed)
  }

  /// Only `Idle -> Running -> {Succeeded | Failed}` is allowed.
  pub fn can_transition_to(self, next: TaskState) -> bool {
    matches!(
      (self, next),
      (TaskState::Idle, TaskState::Running)
        | (TaskState::Running, TaskState::Succeeded)
        | (TaskState::Running, TaskState::Failed)
    )
  }
}

impl fmt::Display for TaskState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      TaskState::Idle => "idle",
      TaskState::Running => "running",
      TaskState::Succeeded => "succeeded",
      TaskState::Failed => "failed",
    };
    f.write_str(name)
  }
}

/// Execution state for one descriptor within one run.
#[derive(Debug)]
pub struct TaskInstance {
  path: TaskPath,
  parent: Option<InstanceId>,
  label: Option<String>,
  mode: Mode,
  work: Option<Work>,
  container: Option<Container>,
  children: Vec<InstanceId>,
  state: TaskState,
  result: Option<String>,
  error: Option<WorkError>,
}

impl TaskInstance {
  fn mount(descriptor: &TaskDescriptor, path: TaskPath, parent: Option<InstanceId>) -> Self {
    // Composites are driven by their children; their work never runs.
    let work = if descriptor.is_leaf() {
      descriptor.work().cloned()
    } else {
      if descriptor.work().is_some() {
        debug!(path = %path, "ignoring work declared on a composite");
      }
      None
    };

    Self {
      path,
      parent,
      label: descriptor.label().map(str::to_owned),
      mode: descriptor.mode(),
      work,
      container: descriptor.container().cloned(),
      children: Vec::with_capacity(descriptor.children().len()),
      state: TaskState::Idle,
      result: None,
      error: None,
    }
  }

  pub fn path(&self) -> &TaskPath {
    &self.path
  }

  pub fn parent(&self) -> Option<InstanceId> {
    self.parent
  }

  pub fn label(&self) -> Option<&str> {
    self.label.as_deref()
  }

  pub fn mode(&self) -> Mode {
    self.mode
  }

  pub fn work(&self) -> Option<&Work> {
    self.work.as_ref()
  }

  pub fn container(&self) -> Option<&Container> {
    self.container.as_ref()
  }

  pub fn children(&self) -> &[InstanceId] {
    &self.children
  }

  pub fn is_leaf(&self) -> bool {
    self.children.is_empty()
  }

  pub fn state(&self) -> TaskState {
    self.state
  }

  /// Set only once the instance has succeeded.
  pub fn result(&self) -> Option<&str> {
    self.result.as_deref()
  }

  /// Set only once the instance has failed.
  pub fn error(&self) -> Option<&WorkError> {
    self.error.as_ref()
  }

  pub(crate) fn begin(&mut self) {
    self.transition(TaskState::Running);
  }

  pub(crate) fn succeed(&mut self, result: String) {
    self.transition(TaskState::Succeeded);
    self.result = Some(result);
  }

  pub(crate) fn fail(&mut self, error: WorkError) {
    self.transition(TaskState::Failed);
    self.error = Some(error);
  }

  fn transition(&mut self, next: TaskState) {
    debug_assert!(
      self.state.can_transition_to(next),
      "invalid transition {} -> {} for task '{}'",
      self.state,
      next,
      self.path
    );
    self.state = next;
  }
}

/// Arena of every instance mounted for one run.
#[derive(Debug)]
pub struct InstanceTree {
  instances: Vec<TaskInstance>,
}

impl InstanceTree {
  /// Mount `root` and all of its descendants, rejecting malformed descriptors
  /// before anything executes.
  pub fn mount(root: &TaskDescriptor, config: &RunnerConfig) -> Result<Self, RunError> {
    let mut tree = Self {
      instances: Vec::with_capacity(root.node_count()),
    };
    tree.mount_node(root, TaskPath::root(), None, config)?;
    Ok(tree)
  }

  fn mount_node(
    &mut self,
    descriptor: &TaskDescriptor,
    path: TaskPath,
    parent: Option<InstanceId>,
    config: &RunnerConfig,
  ) -> Result<InstanceId, RunError> {
    if path.depth() > config.max_depth {
      return Err(RunError::MalformedDescriptor {
        path,
        message: format!("tree is deeper than {} levels", config.max_depth),
      });
    }

    if config.reject_composite_work && !descriptor.is_leaf() && descriptor.work().is_some() {
      return Err(RunError::MalformedDescriptor {
        path,
        message: "descriptor declares both children and work".to_string(),
      });
    }

    let id = InstanceId(self.instances.len());
    self
      .instances
      .push(TaskInstance::mount(descriptor, path.clone(), parent));

    for (index, child) in descriptor.children().iter().enumerate() {
      let child_id = self.mount_node(child, path.child(index), Some(id), config)?;
      self.instances[id.0].children.push(child_id);
    }

    Ok(id)
  }

  pub fn root(&self) -> InstanceId {
    InstanceId(0)
  }

  /// Look up an instance. Ids are only minted by this tree, so every id it
  /// handed out is valid.
  pub fn get(&self, id: InstanceId) -> &TaskInstance {
    &self.instances[id.0]
  }

  pub(crate) fn get_mut(&mut self, id: InstanceId) -> &mut TaskInstance {
    &mut self.instances[id.0]
  }

  /// Find the instance mounted at `path`.
  pub fn find(&self, path: &TaskPath) -> Option<InstanceId> {
    path.indices().iter().try_fold(self.root(), |id, &index| {
      self.get(id).children().get(index).copied()
    })
  }

  pub fn len(&self) -> usize {
    self.instances.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instances.is_empty()
  }

  /// Instances in mount (pre-order) order.
  pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &TaskInstance)> {
    self
      .instances
      .iter()
      .enumerate()
      .map(|(index, instance)| (InstanceId(index), instance))
  }
}
