use serde::{Deserialize, Serialize};

use crate::container::ContainerDef;
use crate::mode::Mode;
use crate::work::WorkDef;

/// One node of a declarative task tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(default)]
  pub mode: Mode,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub container: Option<ContainerDef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub work: Option<WorkDef>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub children: Vec<TaskDef>,
}

impl TaskDef {
  /// Count this node and all of its descendants.
  pub fn node_count(&self) -> usize {
    1 + self.children.iter().map(TaskDef::node_count).sum::<usize>()
  }
}
