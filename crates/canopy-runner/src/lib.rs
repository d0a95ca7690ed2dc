//! Canopy pipeline runner.
//!
//! This crate mounts a [`TaskDescriptor`] tree into live task instances,
//! schedules them according to each composite's [`Mode`], and folds the
//! children's results back into one rendered string.
//!
//! # Architecture
//!
//! ```text
//! PipelineRunner
//! ├── run(descriptor) -> rendered output
//! │   ├── InstanceTree::mount   - one instance per descriptor, pre-order
//! │   ├── schedule::start       - sequential / parallel fan-out per composite
//! │   └── render                - declared-order aggregation of child results
//! ├── in_flight()               - detached children still running
//! └── finish()                  - drive detached in-flight work to completion
//! ```
//!
//! Everything runs on one thread: parallel children are interleaved on the
//! runner's `LocalSet`, never moved to other threads. A run settles as soon as
//! its root does; siblings of a failed parallel peer keep running detached
//! until `finish()` drains them. The free [`run`] spawns onto the caller's
//! `LocalSet` instead and leaves such work there.
//!
//! # Usage
//!
//! ```ignore
//! use canopy_runner::{PipelineRunner, RunnerConfig, TaskDescriptor};
//!
//! let tree = TaskDescriptor::new()
//!   .with_child(TaskDescriptor::composite())
//!   .with_child(TaskDescriptor::composite());
//!
//! let runner = PipelineRunner::new(RunnerConfig::default());
//! let output = runner.run(&tree).await?;
//! assert_eq!(output, "<div><div></div><div></div></div>");
//! runner.finish().await;
//! ```

mod config;
mod error;
mod events;
mod instance;
mod render;
mod runner;
mod schedule;

pub use canopy_task::{Container, Mode, TaskDescriptor, TaskOptions, Work, WorkError};
pub use config::RunnerConfig;
pub use error::RunError;
pub use events::{ChannelNotifier, NoopNotifier, RunEvent, RunNotifier};
pub use instance::{InstanceId, InstanceTree, TaskInstance, TaskPath, TaskState};
pub use render::{render, render_leaf};
pub use runner::{PipelineRunner, run};
