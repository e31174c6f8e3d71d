//! File read tool — return a file's contents as text.

use async_trait::async_trait;
use serde::Deserialize;
use toolpilot_core::schema::{FieldType, ToolSchema};
use toolpilot_core::tool::{Tool, ToolResult};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadFileArgs {
    file_path: String,
}

/// Reads a UTF-8 file. Relative paths resolve against the process cwd.
pub struct FileReadTool;

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Use this when the user asks to read a file, look at code, or analyze file contents. Accepts a relative or absolute path."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new().required("filePath", FieldType::String, "Path of the file to read")
    }

    async fn execute(&self, arguments: serde_json::Value) -> ToolResult {
        let args: ReadFileArgs = match crate::parse_args(self.name(), arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };

        match tokio::fs::read_to_string(&args.file_path).await {
            Ok(content) => {
                info!(tool = "read_file", path = %args.file_path, bytes = content.len(), "File read");
                ToolResult::ok(format!("File contents:\n{content}"))
            }
            Err(e) => {
                warn!(tool = "read_file", path = %args.file_path, error = %e, "File read failed");
                ToolResult::failed(format!("Failed to read file: {e}"))
            }
        }
    }
}
