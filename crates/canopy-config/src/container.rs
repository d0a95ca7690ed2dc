use serde::{Deserialize, Serialize};

/// Container markers wrapped around a node's rendered output.
///
/// Accepted shapes:
/// - `true` / `false` to force the default marker or disable wrapping
/// - `{ "tag": "ul" }` for an element-style `<ul>` / `</ul>` pair
/// - `{ "open": "[", "close": "]" }` for arbitrary markers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContainerDef {
  Enabled(bool),
  Tag { tag: String },
  Markers { open: String, close: String },
}
