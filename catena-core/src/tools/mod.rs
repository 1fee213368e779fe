//! Tools an agent can invoke
//!
//! A tool takes free text and returns free text. The agent loop looks tools
//! up by name in a [`ToolRegistry`] and feeds each result back to the model
//! as an observation.

mod bash;
mod registry;
mod tool;

pub use bash::{BashProcess, BashTool};
pub use registry::ToolRegistry;
pub use tool::{FnTool, Tool};
