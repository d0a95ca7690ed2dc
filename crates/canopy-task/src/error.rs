//! Work error type.

use std::sync::Arc;

use thiserror::Error;

/// Error raised by a unit of work.
///
/// Cloning shares the underlying error, so a failure carried up the tree to the
/// caller is the same error object the leaf raised. Use [`WorkError::ptr_eq`]
/// to check identity.
#[derive(Debug, Clone, Error)]
#[error(transparent)]
pub struct WorkError(Arc<dyn std::error::Error + Send + Sync + 'static>);

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

impl WorkError {
  /// Wrap any error raised by a task body.
  pub fn new<E>(error: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self(Arc::new(error))
  }

  /// An error carrying only a message.
  pub fn msg(message: impl Into<String>) -> Self {
    Self::new(Message(message.into()))
  }

  /// Whether both handles refer to the same raised error.
  pub fn ptr_eq(&self, other: &WorkError) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  /// Borrow the underlying error as a concrete type.
  pub fn downcast_ref<E>(&self) -> Option<&E>
  where
    E: std::error::Error + 'static,
  {
    self.0.downcast_ref::<E>()
  }
}

impl From<std::io::Error> for WorkError {
  fn from(error: std::io::Error) -> Self {
    Self::new(error)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_clone_preserves_identity() {
    let error = WorkError::msg("boom");
    let propagated = error.clone();

    assert!(error.ptr_eq(&propagated));
    assert!(!error.ptr_eq(&WorkError::msg("boom")));
    assert_eq!(propagated.to_string(), "boom");
  }

  #[test]
  fn test_downcast() {
    let error = WorkError::from(std::io::Error::new(
      std::io::ErrorKind::NotFound,
      "missing",
    ));

    let io = error.downcast_ref::<std::io::Error>().unwrap();
    assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    assert!(error.downcast_ref::<std::fmt::Error>().is_none());
  }
}
