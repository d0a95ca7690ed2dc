//! Task descriptors for canopy.
//!
//! A [`TaskDescriptor`] is an immutable description of one node of a task
//! tree: its composition [`Mode`], an optional unit of [`Work`], optional
//! [`Container`] markers and its ordered children. Building a descriptor never
//! runs anything; `canopy-runner` mounts and executes descriptor trees.
//!
//! # Usage
//!
//! ```ignore
//! use canopy_task::{TaskDescriptor, Work};
//!
//! let tree = TaskDescriptor::composite()
//!   .parallel()
//!   .with_child(TaskDescriptor::leaf(Work::new(|| async { Ok("a".to_string()) })))
//!   .with_child(TaskDescriptor::composite());
//! ```

mod container;
mod descriptor;
mod error;
mod work;

pub use canopy_config::Mode;
pub use container::Container;
pub use descriptor::{TaskDescriptor, TaskOptions};
pub use error::WorkError;
pub use work::{Work, WorkFuture};
