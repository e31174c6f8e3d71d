//! Shared test helpers for agent loop tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use toolpilot_core::error::ProviderError;
use toolpilot_core::message::{Message, MessageToolCall};
use toolpilot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use toolpilot_core::schema::{FieldType, ToolSchema};
use toolpilot_core::tool::{Tool, ToolResult};

/// A mock provider that plays back a script of replies.
///
/// Each call to `complete` pops the next entry and records the request.
/// Panics if more calls are made than entries provided.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that only ever answers with the given responses.
    pub fn responses(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider: no more replies (call #{call})"))
    }
}

/// Create a simple text response (no tool calls).
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response that asks for the given tool calls.
pub fn tool_call_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tool_calls("", tool_calls),
        usage: None,
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call with JSON arguments.
pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    }
}

/// Echoes its `text` argument back, prefixed with `echo:`.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the input text"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new().required("text", FieldType::String, "Text to echo")
    }

    async fn execute(&self, arguments: serde_json::Value) -> ToolResult {
        let text = arguments["text"].as_str().unwrap_or_default();
        ToolResult::ok(format!("echo:{text}"))
    }
}
