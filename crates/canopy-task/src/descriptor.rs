//! Immutable task tree descriptors.

use canopy_config::Mode;

use crate::container::Container;
use crate::work::Work;

/// Immutable description of one node of a task tree.
///
/// A node with children is a composite and its `work`, if any, is ignored by
/// the runner. A node without children is a leaf. Construction never executes
/// anything.
///
/// Unless a container is chosen with [`with_container`] or
/// [`without_container`], adding children gives the node the default
/// container, so composites always wrap their children.
///
/// [`with_container`]: TaskDescriptor::with_container
/// [`without_container`]: TaskDescriptor::without_container
#[derive(Debug, Clone, Default)]
pub struct TaskDescriptor {
  mode: Mode,
  work: Option<Work>,
  container: Option<Container>,
  container_chosen: bool,
  label: Option<String>,
  children: Vec<TaskDescriptor>,
}

/// Options-object construction of a descriptor.
///
/// Without an explicit `container`, a descriptor built from options gets the
/// default container when it has children or has no work. Only plain work
/// leaves render bare.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
  pub mode: Mode,
  pub work: Option<Work>,
  pub children: Vec<TaskDescriptor>,
  pub container: Option<Container>,
}

impl TaskDescriptor {
  /// A no-op leaf: no work, no container, no children.
  pub fn new() -> Self {
    Self::default()
  }

  /// A sequential composite wrapped in the default container.
  pub fn composite() -> Self {
    Self::new().with_container(Container::default())
  }

  /// A leaf wrapping `work`.
  pub fn leaf(work: Work) -> Self {
    Self::new().with_work(work)
  }

  pub fn parallel(self) -> Self {
    self.with_mode(Mode::Parallel)
  }

  pub fn sequential(self) -> Self {
    self.with_mode(Mode::Sequential)
  }

  pub fn with_mode(mut self, mode: Mode) -> Self {
    self.mode = mode;
    self
  }

  pub fn with_work(mut self, work: Work) -> Self {
    self.work = Some(work);
    self
  }

  pub fn with_container(mut self, container: Container) -> Self {
    self.container = Some(container);
    self.container_chosen = true;
    self
  }

  pub fn without_container(mut self) -> Self {
    self.container = None;
    self.container_chosen = true;
    self
  }

  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = Some(label.into());
    self
  }

  pub fn with_child(mut self, child: TaskDescriptor) -> Self {
    self.children.push(child);
    self.default_container()
  }

  pub fn with_children(mut self, children: impl IntoIterator<Item = TaskDescriptor>) -> Self {
    self.children.extend(children);
    self.default_container()
  }

  fn default_container(mut self) -> Self {
    if !self.container_chosen && self.container.is_none() && !self.children.is_empty() {
      self.container = Some(Container::default());
    }
    self
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

  pub fn label(&self) -> Option<&str> {
    self.label.as_deref()
  }

  pub fn children(&self) -> &[TaskDescriptor] {
    &self.children
  }

  /// A node without children is executed as a leaf.
  pub fn is_leaf(&self) -> bool {
    self.children.is_empty()
  }

  /// Count this node and all of its descendants.
  pub fn node_count(&self) -> usize {
    1 + self.children.iter().map(TaskDescriptor::node_count).sum::<usize>()
  }

  /// Depth of the deepest node below this one (a lone node has depth 0).
  pub fn depth(&self) -> usize {
    self
      .children
      .iter()
      .map(|child| child.depth() + 1)
      .max()
      .unwrap_or(0)
  }
}

impl PartialEq for TaskDescriptor {
  fn eq(&self, other: &Self) -> bool {
    self.mode == other.mode
      && self.work == other.work
      && self.container == other.container
      && self.label == other.label
      && self.children == other.children
  }
}

impl From<TaskOptions> for TaskDescriptor {
  fn from(options: TaskOptions) -> Self {
    let container_chosen = options.container.is_some();
    let container = options.container.or_else(|| {
      (options.work.is_none() || !options.children.is_empty()).then(Container::default)
    });

    Self {
      mode: options.mode,
      work: options.work,
      container,
      container_chosen,
      label: None,
      children: options.children,
    }
  }
}
