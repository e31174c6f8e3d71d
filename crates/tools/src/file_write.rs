//! File write tool — write text to a path, creating parent directories.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use toolpilot_core::schema::{FieldType, ToolSchema};
use toolpilot_core::tool::{Tool, ToolResult};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteFileArgs {
    file_path: String,
    content: String,
}

/// Writes (or overwrites) a file.
pub struct FileWriteTool;

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file at the given path. Missing directories are created automatically."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("filePath", FieldType::String, "Path of the file to write")
            .required("content", FieldType::String, "Content to write to the file")
    }

    async fn execute(&self, arguments: serde_json::Value) -> ToolResult {
        let args: WriteFileArgs = match crate::parse_args(self.name(), arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        // Ensure parent directory exists
        if let Some(parent) = Path::new(&args.file_path).parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            warn!(tool = "write_file", path = %args.file_path, error = %e, "Creating directories failed");
            return ToolResult::failed(format!("Failed to write file: {e}"));
        }

        match tokio::fs::write(&args.file_path, &args.content).await {
            Ok(()) => {
                info!(tool = "write_file", path = %args.file_path, bytes = args.content.len(), "File written");
                ToolResult::ok(format!("File written successfully: {}", args.file_path))
            }
            Err(e) => {
                warn!(tool = "write_file", path = %args.file_path, error = %e, "File write failed");
                ToolResult::failed(format!("Failed to write file: {e}"))
            }
        }
    }
}
