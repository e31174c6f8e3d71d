//! Configuration loading and validation for Toolpilot.
//!
//! Loads configuration from `~/.toolpilot/config.toml` (or an explicit
//! path), then applies the `MODEL_NAME`, `API_KEY` and `BASE_URL`
//! overrides from the environment or from a `.env` file in the working
//! directory. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// System prompt used when the config does not override it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an experienced programmer who completes tasks by using tools.

Tools:
1. read_file: read the contents of a file
2. write_file: write content to a file, creating directories as needed
3. execute_command: run a system command, optionally in a given working directory or in the background

Each command runs in a fresh shell. Pass workingDirectory instead of using cd.";

/// The root configuration structure.
///
/// Maps directly to `~/.toolpilot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model identifier sent with every request
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// API key for the model backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per response; the backend decides when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Model round trips allowed per user prompt
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// HTTP timeout for a single model request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Replaces [`DEFAULT_SYSTEM_PROMPT`] when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// What the agent loop does with calls to tools it does not know
    #[serde(default)]
    pub unknown_tools: UnknownToolPolicy,

    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_model_name() -> String {
    "gpt-4o-mini".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_iterations() -> u32 {
    30
}
fn default_request_timeout_secs() -> u64 {
    120
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model_name", &self.model_name)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_iterations", &self.max_iterations)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("system_prompt", &self.system_prompt)
            .field("unknown_tools", &self.unknown_tools)
            .field("tools", &self.tools)
            .finish()
    }
}

/// Handling of tool calls whose name is not in the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownToolPolicy {
    /// Append nothing and move on to the next call
    #[default]
    Skip,
    /// Append an error tool result so the model learns the tool is missing
    Report,
}

/// Where a foreground command's output goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForegroundOutput {
    /// Child shares the terminal; nothing is captured
    Inherit,
    /// Forwarded live to the terminal and captured for the model
    #[default]
    Tee,
    /// Captured only
    Capture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub foreground_output: ForegroundOutput,

    /// Cap on captured command output kept for the model
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_max_output_bytes() -> usize {
    64 * 1024
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            foreground_output: ForegroundOutput::default(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.toolpilot/config.toml),
    /// then apply environment overrides:
    /// - `MODEL_NAME`
    /// - `API_KEY`
    /// - `BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(&Self::config_dir().join("config.toml"))
    }

    /// Like [`AppConfig::load`], reading the file at `path`.
    ///
    /// Overrides may also come from `./.env`; a variable set in the real
    /// environment wins over the same key in the file.
    pub fn load_with(path: &Path) -> Result<Self, ConfigError> {
        let dotenv = read_dotenv(Path::new(".env"))?;
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(env_over_dotenv(|key| std::env::var(key).ok(), &dotenv));
        config.validate()?;

        if !config.has_api_key() {
            tracing::warn!("No API key configured; set API_KEY if the backend requires one");
        }
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides from `lookup` (highest priority).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = non_empty("MODEL_NAME") {
            self.model_name = model;
        }
        if let Some(key) = non_empty("API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty("BASE_URL") {
            self.base_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolpilot")
    }

    /// The system prompt a new session starts with.
    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "max_iterations must be at least 1".into(),
            ));
        }

        if self.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("base_url must not be empty".into()));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            api_key: None,
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: None,
            max_iterations: default_max_iterations(),
            request_timeout_secs: default_request_timeout_secs(),
            system_prompt: None,
            unknown_tools: UnknownToolPolicy::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Read `KEY=value` pairs from a dotenv file. A missing file yields none.
pub fn read_dotenv(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let parse_error = |e: dotenvy::Error| ConfigError::ParseError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let mut values = HashMap::new();
    for item in dotenvy::from_path_iter(path).map_err(parse_error)? {
        let (key, value) = item.map_err(parse_error)?;
        values.insert(key, value);
    }
    tracing::debug!(path = %path.display(), keys = values.len(), "Loaded dotenv file");
    Ok(values)
}

/// Look keys up in `env` first, then in `dotenv`.
fn env_over_dotenv<'a>(
    env: impl Fn(&str) -> Option<String> + 'a,
    dotenv: &'a HashMap<String, String>,
) -> impl Fn(&str) -> Option<String> + 'a {
    move |key: &str| env(key).or_else(|| dotenv.get(key).cloned())
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iterations, 30);
        assert_eq!(config.unknown_tools, UnknownToolPolicy::Skip);
        assert_eq!(config.tools.foreground_output, ForegroundOutput::Tee);
        assert_eq!(config.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model_name, config.model_name);
        assert_eq!(parsed.tools.max_output_bytes, config.tools.max_output_bytes);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = AppConfig {
            max_iterations: 0,
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model_name, "gpt-4o-mini");
    }

    #[test]
    fn file_values_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model_name = "deepseek-chat"
base_url = "https://api.deepseek.com/v1"
max_iterations = 5
unknown_tools = "report"
system_prompt = "Be brief."

[tools]
foreground_output = "capture"
max_output_bytes = 1024
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model_name, "deepseek-chat");
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.unknown_tools, UnknownToolPolicy::Report);
        assert_eq!(config.tools.foreground_output, ForegroundOutput::Capture);
        assert_eq!(config.tools.max_output_bytes, 1024);
        assert_eq!(config.system_prompt(), "Be brief.");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_iterations = \"many\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("MODEL_NAME", "qwen-plus"),
            ("API_KEY", "sk-test"),
            ("BASE_URL", "http://localhost:11434/v1"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.model_name, "qwen-plus");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|_| Some("  ".into()));
        assert_eq!(config.model_name, "gpt-4o-mini");
        assert!(!config.has_api_key());
    }

    #[test]
    fn dotenv_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# local settings\nMODEL_NAME=deepseek-chat\nAPI_KEY=\"sk-from-file\"\n",
        )
        .unwrap();

        let values = read_dotenv(&path).unwrap();
        assert_eq!(values.get("MODEL_NAME").map(String::as_str), Some("deepseek-chat"));
        assert_eq!(values.get("API_KEY").map(String::as_str), Some("sk-from-file"));
    }

    #[test]
    fn missing_dotenv_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_dotenv(&dir.path().join(".env")).unwrap().is_empty());
    }

    #[test]
    fn real_env_wins_over_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "MODEL_NAME=from-file\nAPI_KEY=sk-file\n").unwrap();
        let dotenv = read_dotenv(&path).unwrap();
        let env: HashMap<&str, &str> = [("MODEL_NAME", "from-env")].into_iter().collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(env_over_dotenv(
            |k| env.get(k).map(|v| v.to_string()),
            &dotenv,
        ));

        assert_eq!(config.model_name, "from-env");
        assert_eq!(config.api_key.as_deref(), Some("sk-file"));
        assert_eq!(config.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
