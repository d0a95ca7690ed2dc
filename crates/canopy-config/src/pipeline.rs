use serde::{Deserialize, Serialize};

use crate::task::TaskDef;

/// A named task tree, as stored in a pipeline file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDef {
  pub name: String,
  pub root: TaskDef,
}

impl PipelineDef {
  /// Parse a pipeline definition from JSON text.
  pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(content)
  }
}
