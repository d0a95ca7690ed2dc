use serde::{Deserialize, Serialize};

/// Built-in units of work a leaf can declare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkDef {
  /// Resolve to a fixed fragment, optionally after a delay.
  Emit {
    #[serde(default)]
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delay_ms: Option<u64>,
  },
  /// Fail with the given message, optionally after a delay.
  Fail {
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delay_ms: Option<u64>,
  },
  /// Run a process and resolve to its stdout.
  Command {
    program: String,
    #[serde(default)]
    args: Vec<String>,
    /// Strip trailing whitespace from stdout.
    #[serde(default)]
    trim: bool,
  },
}
