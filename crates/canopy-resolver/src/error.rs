use std::process::ExitStatus;

use canopy_task::WorkError;
use thiserror::Error;

/// Errors that can occur during pipeline resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// A command work unit names no program.
  #[error("command at '{path}' has an empty program")]
  EmptyProgram { path: String },

  /// A container definition cannot be turned into markers.
  #[error("invalid container at '{path}': {message}")]
  InvalidContainer { path: String, message: String },
}

/// Errors raised by `command` work while it runs.
#[derive(Debug, Error)]
pub enum CommandError {
  /// The process could not be started.
  #[error("failed to spawn '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The process could not be waited on.
  #[error("failed to wait for '{program}': {source}")]
  Wait {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The process exited unsuccessfully.
  #[error("'{program}' exited with {status}: {stderr}")]
  Failed {
    program: String,
    status: ExitStatus,
    stderr: String,
  },

  /// The process wrote something other than UTF-8 to stdout.
  #[error("'{program}' produced non-UTF-8 output")]
  InvalidOutput { program: String },
}

impl From<CommandError> for WorkError {
  fn from(error: CommandError) -> Self {
    WorkError::new(error)
  }
}
