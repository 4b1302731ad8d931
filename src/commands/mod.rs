//! Command registration, enablement and dispatch.

pub mod descriptor;
pub mod registry;

pub use descriptor::{CommandAction, CommandDescriptor, Enablement};
pub use registry::{CommandContext, CommandRegistry};
