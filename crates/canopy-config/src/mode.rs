use serde::{Deserialize, Serialize};

/// How a composite schedules its children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
  /// One child at a time, in declared order.
  #[default]
  Sequential,
  /// Every child started in the same turn, then awaited together.
  Parallel,
}

impl Mode {
  pub fn is_parallel(self) -> bool {
    matches!(self, Mode::Parallel)
  }
}
