//! Runner errors.

use canopy_task::WorkError;
use thiserror::Error;

use crate::instance::TaskPath;

/// Errors a pipeline run can end with.
#[derive(Debug, Clone, Error)]
pub enum RunError {
  /// A task's work failed. This is the error the leaf raised, unchanged.
  #[error(transparent)]
  Task(WorkError),

  /// A descriptor was rejected while mounting; no work was started.
  #[error("malformed task descriptor at '{path}': {message}")]
  MalformedDescriptor { path: TaskPath, message: String },
}

impl RunError {
  /// The error raised by the failing task, if the run failed in a task.
  pub fn work_error(&self) -> Option<&WorkError> {
    match self {
      RunError::Task(error) => Some(error),
      RunError::MalformedDescriptor { .. } => None,
    }
  }
}

impl From<WorkError> for RunError {
  fn from(error: WorkError) -> Self {
    RunError::Task(error)
  }
}
