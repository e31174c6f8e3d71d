//! Built-in tool implementations for Toolpilot.
//!
//! The agent gets exactly three tools: read a file, write a file, and run a
//! command in the foreground or background.

pub mod execute_command;
pub mod file_read;
pub mod file_write;
pub mod process;

use serde::de::DeserializeOwned;
use toolpilot_config::ToolsConfig;
use toolpilot_core::error::ToolError;
use toolpilot_core::tool::{ToolRegistry, ToolResult};
use tracing::warn;

pub use execute_command::ExecuteCommandTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;

/// Create the tool registry with all built-in tools.
pub fn default_registry(config: &ToolsConfig) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(FileReadTool))?;
    registry.register(Box::new(FileWriteTool))?;
    registry.register(Box::new(ExecuteCommandTool::from_config(config)))?;
    Ok(registry)
}

/// Decode already-validated arguments into a tool's typed argument struct.
pub(crate) fn parse_args<T: DeserializeOwned>(
    tool: &str,
    arguments: serde_json::Value,
) -> Result<T, ToolResult> {
    serde_json::from_value(arguments).map_err(|e| {
        warn!(tool, error = %e, "Rejected tool arguments");
        ToolResult::failed(format!("Invalid arguments for {tool}: {e}"))
    })
}
