use std::path::PathBuf;

use canopy_config::{ContainerDef, PipelineDef, TaskDef};
use canopy_task::{Container, TaskDescriptor};
use tracing::debug;

use crate::error::ResolveError;
use crate::work;

/// Resolver transforms a PipelineDef into an executable descriptor tree.
pub trait Resolver {
  /// Resolve a pipeline definition into its root descriptor.
  ///
  /// This process:
  /// 1. Validates work and container definitions
  /// 2. Builds the work unit for every leaf
  /// 3. Applies container defaults
  fn resolve(&self, def: &PipelineDef) -> Result<TaskDescriptor, ResolveError>;
}

/// Configuration for the standard resolver.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
  /// Directory `command` work runs in. Defaults to the current directory.
  pub working_dir: Option<PathBuf>,
}

/// Standard resolver for the built-in work kinds.
#[derive(Debug, Clone, Default)]
pub struct StandardResolver {
  config: ResolverConfig,
}

impl StandardResolver {
  pub fn new(config: ResolverConfig) -> Self {
    Self { config }
  }

  /// Resolve a single node and its subtree.
  fn resolve_node(&self, def: &TaskDef, path: &str) -> Result<TaskDescriptor, ResolveError> {
    let mut descriptor = TaskDescriptor::new().with_mode(def.mode);

    if let Some(label) = &def.label {
      descriptor = descriptor.with_label(label.clone());
    }
    descriptor = match container(def, path)? {
      Some(container) => descriptor.with_container(container),
      None => descriptor.without_container(),
    };
    if let Some(work_def) = &def.work {
      let work = work::build(work_def, path, self.config.working_dir.as_ref())?;
      descriptor = descriptor.with_work(work);
    }

    let children = def
      .children
      .iter()
      .enumerate()
      .map(|(index, child)| self.resolve_node(child, &child_path(path, index)))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(descriptor.with_children(children))
  }
}

impl Resolver for StandardResolver {
  fn resolve(&self, def: &PipelineDef) -> Result<TaskDescriptor, ResolveError> {
    let root = self.resolve_node(&def.root, "/")?;
    debug!(
      pipeline = %def.name,
      nodes = def.root.node_count(),
      "pipeline_resolved"
    );
    Ok(root)
  }
}

fn child_path(parent: &str, index: usize) -> String {
  if parent == "/" {
    format!("/{}", index)
  } else {
    format!("{}/{}", parent, index)
  }
}

/// Container markers for `def`.
///
/// Without an explicit definition, composites and nodes without work get the
/// default markers and plain work leaves get none.
fn container(def: &TaskDef, path: &str) -> Result<Option<Container>, ResolveError> {
  let container = match &def.container {
    None if def.work.is_none() || !def.children.is_empty() => Some(Container::default()),
    None | Some(ContainerDef::Enabled(false)) => None,
    Some(ContainerDef::Enabled(true)) => Some(Container::default()),
    Some(ContainerDef::Tag { tag }) => {
      let valid = !tag.is_empty()
        && tag
          .chars()
          .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
      if !valid {
        return Err(ResolveError::InvalidContainer {
          path: path.to_string(),
          message: format!("'{}' is not a valid tag name", tag),
        });
      }
      Some(Container::tag(tag))
    }
    Some(ContainerDef::Markers { open, close }) => {
      if open.is_empty() && close.is_empty() {
        return Err(ResolveError::InvalidContainer {
          path: path.to_string(),
          message: "open and close markers are both empty; use `false` to disable".to_string(),
        });
      }
      Some(Container::new(open.clone(), close.clone()))
    }
  };

  Ok(container)
}
