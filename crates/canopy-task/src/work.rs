use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::error::WorkError;

/// The future a unit of work returns: the leaf's rendered fragment, or the
/// error it raised.
pub type WorkFuture = LocalBoxFuture<'static, Result<String, WorkError>>;

/// A unit of asynchronous work attached to a leaf descriptor.
///
/// Cloning is cheap and shares the callable. Two `Work` values compare equal
/// only when they share the same callable.
#[derive(Clone)]
pub struct Work(Rc<dyn Fn() -> WorkFuture>);

impl Work {
  /// Wrap a callable whose future resolves to the leaf's fragment.
  pub fn new<F, Fut>(f: F) -> Self
  where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<String, WorkError>> + 'static,
  {
    Self(Rc::new(move || f().boxed_local()))
  }

  /// Wrap a callable run for its side effects only; it contributes an empty
  /// fragment.
  pub fn effect<F, Fut>(f: F) -> Self
  where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<(), WorkError>> + 'static,
  {
    Self::new(move || f().map(|outcome| outcome.map(|()| String::new())))
  }

  /// Start the work by calling the callable once. Its synchronous body runs
  /// before this returns; an `async` block it returns does not run until the
  /// future is first polled.
  pub fn invoke(&self) -> WorkFuture {
    (self.0)()
  }

  /// Whether both values share the same callable.
  pub fn same(&self, other: &Work) -> bool {
    Rc::ptr_eq(&self.0, &other.0)
  }
}

impl PartialEq for Work {
  fn eq(&self, other: &Self) -> bool {
    self.same(other)
  }
}

impl fmt::Debug for Work {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Work").field(&Rc::as_ptr(&self.0)).finish()
  }
}
