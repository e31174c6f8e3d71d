//! Command tool — run a shell command in the foreground or background.
//!
//! Every call spawns a fresh shell, so nothing (in particular the current
//! directory) carries over between calls. Every outcome, including spawn
//! failures and non-zero exits, comes back as text.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use toolpilot_config::{ForegroundOutput, ToolsConfig};
use toolpilot_core::schema::{FieldType, ToolSchema};
use toolpilot_core::tool::{Tool, ToolResult};
use tracing::{info, warn};

use crate::process::{ExecutionMode, ProcessHandle, ProcessOutcome};

const CD_HINT: &str = "Note: each command runs in a fresh shell, so `cd` does not carry over to later calls. Pass workingDirectory instead of using cd.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteCommandArgs {
    command: String,
    #[serde(default)]
    working_directory: Option<String>,
    #[serde(default)]
    background: Option<bool>,
}

/// Runs system commands through the platform shell.
pub struct ExecuteCommandTool {
    foreground_output: ForegroundOutput,
    max_output_bytes: usize,
}

impl ExecuteCommandTool {
    pub fn new(foreground_output: ForegroundOutput, max_output_bytes: usize) -> Self {
        Self {
            foreground_output,
            max_output_bytes,
        }
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        Self::new(config.foreground_output, config.max_output_bytes)
    }

    async fn run_foreground(&self, command: &str, cwd: &Path, notes: &Notes<'_>) -> ToolResult {
        let mode = ExecutionMode::Foreground(self.foreground_output);
        let handle = match ProcessHandle::spawn(command, cwd, mode) {
            Ok(handle) => handle,
            Err(e) => return spawn_failure(command, cwd, &e),
        };

        match handle.wait(self.max_output_bytes).await {
            Ok(outcome) => {
                match outcome.exit_code {
                    Some(0) => info!(tool = "execute_command", command, "Command succeeded"),
                    code => warn!(tool = "execute_command", command, exit_code = ?code, "Command failed"),
                }
                foreground_report(command, notes, &outcome, self.max_output_bytes)
            }
            Err(e) => {
                warn!(tool = "execute_command", command, error = %e, "Waiting on command failed");
                ToolResult::failed(format!("Command failed: {command}\nError: {e}"))
            }
        }
    }

    fn run_background(&self, command: &str, cwd: &Path, notes: &Notes<'_>) -> ToolResult {
        match ProcessHandle::spawn(command, cwd, ExecutionMode::Background) {
            Ok(handle) => {
                let pid = handle.detach(self.max_output_bytes);
                info!(tool = "execute_command", command, ?pid, "Background process started");
                background_report(command, pid, notes)
            }
            Err(e) => spawn_failure(command, cwd, &e),
        }
    }
}

impl Default for ExecuteCommandTool {
    fn default() -> Self {
        Self::from_config(&ToolsConfig::default())
    }
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a system command. Supports a working directory and background mode. For long-running services (e.g. npm run dev, npm start) set background: true."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("command", FieldType::String, "The command to execute")
            .optional(
                "workingDirectory",
                FieldType::String,
                "Directory to run the command in (recommended)",
            )
            .optional(
                "background",
                FieldType::Boolean,
                "Run in the background without waiting (set to true when starting a service)",
            )
    }

    async fn execute(&self, arguments: serde_json::Value) -> ToolResult {
        let args: ExecuteCommandArgs = match crate::parse_args(self.name(), arguments) {
            Ok(args) => args,
            Err(result) => return result,
        };
        let command = args.command.trim();

        let tokens = match shlex::split(command) {
            Some(tokens) if !tokens.is_empty() => tokens,
            Some(_) => return ToolResult::failed("Command is empty"),
            None => {
                return ToolResult::failed(format!(
                    "Failed to parse command (check for unbalanced quotes): {command}"
                ));
            }
        };

        let working_directory = args
            .working_directory
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        let cwd = match working_directory {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        let background = args.background.unwrap_or(false);
        let notes = Notes {
            working_directory,
            changes_directory: changes_directory(&tokens),
        };

        info!(
            tool = "execute_command",
            command,
            program = %tokens[0],
            cwd = %cwd.display(),
            background,
            "Running command"
        );

        if background {
            self.run_background(command, &cwd, &notes)
        } else {
            self.run_foreground(command, &cwd, &notes).await
        }
    }
}

/// Context that shapes the hints appended to a result.
struct Notes<'a> {
    working_directory: Option<&'a str>,
    changes_directory: bool,
}

/// Whether the command line runs `cd` anywhere it would take effect.
///
/// Shell words only split on whitespace, so control operators glued to
/// their neighbours (`app&&cd`, `true;cd`) are split out here.
fn changes_directory(tokens: &[String]) -> bool {
    let mut command_start = true;
    for token in tokens {
        for (i, word) in token.split(['&', '|', ';']).enumerate() {
            if i > 0 {
                command_start = true;
            }
            if word.is_empty() {
                continue;
            }
            if command_start && word == "cd" {
                return true;
            }
            command_start = false;
        }
    }
    false
}

fn spawn_failure(command: &str, cwd: &Path, error: &std::io::Error) -> ToolResult {
    warn!(tool = "execute_command", command, cwd = %cwd.display(), error = %error, "Command failed to start");
    ToolResult::failed(format!(
        "Command failed to start: {error}\nCommand: {command}\nWorking directory: {}",
        cwd.display()
    ))
}

fn foreground_report(
    command: &str,
    notes: &Notes<'_>,
    outcome: &ProcessOutcome,
    max_output_bytes: usize,
) -> ToolResult {
    let mut text = match outcome.exit_code {
        Some(0) => format!("Command succeeded: {command}"),
        Some(code) => format!("Command failed with exit code {code}: {command}"),
        None => format!("Command failed: terminated by signal: {command}"),
    };

    if outcome.success()
        && let Some(dir) = notes.working_directory
    {
        text.push_str(&format!(
            "\n\nNote: the command ran in \"{dir}\". To keep working in this project, pass workingDirectory: \"{dir}\" on later calls instead of using cd."
        ));
    }
    if notes.changes_directory {
        text.push_str("\n\n");
        text.push_str(CD_HINT);
    }
    if !outcome.output.is_empty() {
        text.push_str("\n\nOutput:\n");
        text.push_str(&outcome.output);
        if outcome.truncated {
            text.push_str(&format!("\n[output truncated after {max_output_bytes} bytes]"));
        }
    }

    if outcome.success() {
        ToolResult::ok(text)
    } else {
        ToolResult::failed(text)
    }
}

fn background_report(command: &str, pid: Option<u32>, notes: &Notes<'_>) -> ToolResult {
    let mut text = match pid {
        Some(pid) => format!("Command started in background: {command} (pid {pid})"),
        None => format!("Command started in background: {command}"),
    };
    if let Some(dir) = notes.working_directory {
        text.push_str(&format!("\n\nNote: the process was started in \"{dir}\"."));
    }
    if notes.changes_directory {
        text.push_str("\n\n");
        text.push_str(CD_HINT);
    }
    text.push_str(
        "\n\nThe process keeps running on its own and you can continue the conversation. \
         Stop it with a kill command when it is no longer needed.",
    );
    ToolResult::ok(text)
}
