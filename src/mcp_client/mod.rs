//! MCP tool servers — declared configuration and the invocation seam.
//!
//! This module handles:
//! - Loading the `toolServers` document from a file or URL
//! - An ordered registry with deterministic first-server fallback
//! - Rendering server descriptions for prompts
//! - The `ToolInvoker` trait and its model-simulated default
//!
//! No tool server protocol is spoken here; see [`invoker`] for the seam a
//! real transport plugs into.

pub mod errors;
pub mod invoker;
pub mod loader;
pub mod registry;
pub mod types;

// Re-exports for convenience
pub use errors::{InvokeError, McpError};
pub use invoker::{InvocationContext, SimulatedToolInvoker, ToolInvoker};
pub use loader::{load_registry, parse_tool_servers, ToolConfigSource};
pub use registry::{ToolRegistry, ToolResolution};
pub use types::{ArgumentSpec, CommandSpec, ToolConfig};
