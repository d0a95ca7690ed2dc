//! Canopy Config
//!
//! This crate contains the serializable pipeline configuration types for canopy.
//! These types describe a task tree before it is resolved into executable
//! descriptors by `canopy-resolver`.
//!
//! Configuration is loaded from JSON files (via the CLI with `canopy run tree.json`).

mod container;
mod mode;
mod pipeline;
mod task;
mod work;

pub use container::ContainerDef;
pub use mode::Mode;
pub use pipeline::PipelineDef;
pub use task::TaskDef;
pub use work::WorkDef;
