//! Pipeline resolution for canopy.
//!
//! Turns a declarative [`PipelineDef`](canopy_config::PipelineDef) into a
//! [`TaskDescriptor`](canopy_task::TaskDescriptor) tree the runner can execute.

mod error;
mod resolver;
mod work;

pub use error::{CommandError, ResolveError};
pub use resolver::{Resolver, ResolverConfig, StandardResolver};
