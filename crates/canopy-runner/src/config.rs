/// Configuration for the pipeline runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
  /// Deepest level below the root accepted when mounting.
  pub max_depth: usize,
  /// Reject descriptors that declare both children and work, instead of
  /// ignoring the work.
  pub reject_composite_work: bool,
}

impl RunnerConfig {
  pub const DEFAULT_MAX_DEPTH: usize = 256;
}

impl Default for RunnerConfig {
  fn default() -> Self {
    Self {
      max_depth: Self::DEFAULT_MAX_DEPTH,
      reject_composite_work: false,
    }
  }
}
