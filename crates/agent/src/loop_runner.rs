//! The agent reasoning loop implementation.

use std::sync::Arc;
use toolpilot_config::UnknownToolPolicy;
use toolpilot_core::error::ToolError;
use toolpilot_core::message::{Conversation, Message};
use toolpilot_core::provider::{Provider, ProviderRequest};
use toolpilot_core::tool::{ToolCall, ToolRegistry};
use tracing::{debug, info, warn};

/// Model round-trips allowed per user turn unless configured otherwise.
pub const DEFAULT_MAX_ITERATIONS: u32 = 30;

/// Returned instead of an answer when a turn runs out of iterations.
pub const MAX_ITERATIONS_REACHED: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

/// The core agent loop that orchestrates LLM calls and tool execution.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Tool registry, shared read-only
    tools: Arc<ToolRegistry>,

    /// Maximum model round-trips per turn
    max_iterations: u32,

    /// What to do with calls to unregistered tools
    unknown_tools: UnknownToolPolicy,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            unknown_tools: UnknownToolPolicy::default(),
        }
    }

    /// Set the maximum number of model round-trips per turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_unknown_tool_policy(mut self, policy: UnknownToolPolicy) -> Self {
        self.unknown_tools = policy;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run one user turn to completion.
    ///
    /// Appends `prompt` as a user message, then alternates between the
    /// provider and the tools until the model answers without tool calls.
    /// Provider faults end the turn with an error; everything appended
    /// before the fault stays in `conversation`.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        prompt: &str,
    ) -> Result<String, toolpilot_core::Error> {
        conversation.push(Message::user(prompt));
        info!(
            conversation_id = %conversation.id,
            messages = conversation.len(),
            "Processing user turn"
        );

        let tool_definitions = self.tools.definitions();

        for iteration in 1..=self.max_iterations {
            debug!(
                conversation_id = %conversation.id,
                iteration,
                "Agent loop iteration"
            );

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages().to_vec(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response = self.provider.complete(request).await?;
            if let Some(usage) = &response.usage {
                debug!(
                    model = %response.model,
                    tokens = usage.total_tokens,
                    "Model responded"
                );
            }

            if !response.message.has_tool_calls() {
                let answer = response.message.content.clone();
                conversation.push(response.message);
                return Ok(answer);
            }

            let tool_calls = response.message.tool_calls.clone();
            conversation.push(response.message);
            debug!(tool_count = tool_calls.len(), "Executing tool calls");

            for tc in &tool_calls {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: serde_json::from_str(&tc.arguments)
                        .unwrap_or(serde_json::Value::Null),
                };

                match self.tools.execute(&call).await {
                    Ok(result) => {
                        debug!(tool = %tc.name, success = result.success, "Tool finished");
                        conversation.push(Message::tool_result(&tc.id, result.output));
                    }
                    Err(e @ ToolError::NotFound(_)) => match self.unknown_tools {
                        UnknownToolPolicy::Skip => {
                            warn!(tool = %tc.name, "Skipping call to unknown tool");
                        }
                        UnknownToolPolicy::Report => {
                            warn!(tool = %tc.name, "Reporting call to unknown tool");
                            conversation.push(Message::tool_result(&tc.id, format!("Error: {e}")));
                        }
                    },
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool call rejected");
                        // Report the error to the LLM so it can recover
                        conversation.push(Message::tool_result(&tc.id, format!("Error: {e}")));
                    }
                }
            }
        }

        warn!(
            conversation_id = %conversation.id,
            max_iterations = self.max_iterations,
            "Max tool iterations reached"
        );
        Ok(MAX_ITERATIONS_REACHED.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::json;
    use toolpilot_core::error::ProviderError;
    use toolpilot_core::message::Role;

    fn echo_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        Arc::new(registry)
    }

    fn agent(provider: Arc<ScriptedProvider>) -> AgentLoop {
        AgentLoop::new(provider, "mock-model", 0.7, echo_registry())
    }

    #[tokio::test]
    async fn simple_text_response() {
        let provider = Arc::new(ScriptedProvider::responses(vec![text_response(
            "Hello! How can I help?",
        )]));
        let agent = agent(provider.clone());

        let mut conv = Conversation::with_system_prompt("be helpful");
        let answer = agent.run(&mut conv, "Hello!").await.unwrap();

        assert_eq!(answer, "Hello! How can I help?");
        // System + User + Assistant
        assert_eq!(conv.len(), 3);
        assert_eq!(conv.messages()[1].role, Role::User);
        assert_eq!(conv.messages()[1].content, "Hello!");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn requests_carry_history_and_tool_definitions() {
        let provider = Arc::new(ScriptedProvider::responses(vec![text_response("hi")]));
        let agent = agent(provider.clone()).with_max_tokens(256);

        let mut conv = Conversation::with_system_prompt("sys");
        agent.run(&mut conv, "ping").await.unwrap();

        let request = &provider.requests()[0];
        assert_eq!(request.model, "mock-model");
        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.tools[0].name, "echo");
    }

    #[tokio::test]
    async fn tool_round_trip_then_answer() {
        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(vec![tool_call("call_1", "echo", json!({"text": "hi"}))]),
            text_response("done"),
        ]));
        let agent = agent(provider.clone());

        let mut conv = Conversation::new();
        let answer = agent.run(&mut conv, "say hi").await.unwrap();

        assert_eq!(answer, "done");
        // User, Assistant(tool call), Tool, Assistant
        assert_eq!(conv.len(), 4);
        let tool_msg = &conv.messages()[2];
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_msg.content, "echo:hi");

        // The second request sees the tool result
        let second = &provider.requests()[1];
        assert_eq!(second.messages.last().unwrap().content, "echo:hi");
    }

    #[tokio::test]
    async fn multiple_calls_run_in_emitted_order() {
        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(vec![
                tool_call("a", "echo", json!({"text": "first"})),
                tool_call("b", "echo", json!({"text": "second"})),
            ]),
            text_response("ok"),
        ]));
        let agent = agent(provider);

        let mut conv = Conversation::new();
        agent.run(&mut conv, "go").await.unwrap();

        let results: Vec<_> = conv
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| (m.tool_call_id.clone().unwrap(), m.content.clone()))
            .collect();
        assert_eq!(
            results,
            vec![
                ("a".to_string(), "echo:first".to_string()),
                ("b".to_string(), "echo:second".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_skipped_by_default() {
        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(vec![
                tool_call("x", "launch_rocket", json!({})),
                tool_call("y", "echo", json!({"text": "still here"})),
            ]),
            text_response("ok"),
        ]));
        let agent = agent(provider);

        let mut conv = Conversation::new();
        agent.run(&mut conv, "go").await.unwrap();

        assert_eq!(conv.count_role(Role::Tool), 1);
        assert!(
            conv.messages()
                .iter()
                .all(|m| m.tool_call_id.as_deref() != Some("x"))
        );
    }

    #[tokio::test]
    async fn unknown_tool_can_be_reported() {
        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(vec![tool_call("x", "launch_rocket", json!({}))]),
            text_response("ok"),
        ]));
        let agent = agent(provider).with_unknown_tool_policy(UnknownToolPolicy::Report);

        let mut conv = Conversation::new();
        agent.run(&mut conv, "go").await.unwrap();

        let tool_msg = conv
            .messages()
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("x"));
        assert_eq!(tool_msg.content, "Error: Tool not found: launch_rocket");
    }

    #[tokio::test]
    async fn invalid_arguments_are_fed_back() {
        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(vec![tool_call("c", "echo", json!({"text": 5}))]),
            text_response("sorry"),
        ]));
        let agent = agent(provider);

        let mut conv = Conversation::new();
        agent.run(&mut conv, "go").await.unwrap();

        let tool_msg = &conv.messages()[2];
        assert_eq!(tool_msg.role, Role::Tool);
        assert!(tool_msg.content.starts_with("Error: Invalid tool arguments: echo"));
    }

    #[tokio::test]
    async fn unparseable_arguments_are_fed_back() {
        let mut call = tool_call("c", "echo", json!({}));
        call.arguments = "{not json".into();
        let provider = Arc::new(ScriptedProvider::responses(vec![
            tool_call_response(vec![call]),
            text_response("sorry"),
        ]));
        let agent = agent(provider);

        let mut conv = Conversation::new();
        agent.run(&mut conv, "go").await.unwrap();

        assert!(conv.messages()[2].content.starts_with("Error: Invalid tool arguments"));
    }

    #[tokio::test]
    async fn stops_at_max_iterations() {
        let looping = (0..3)
            .map(|i| {
                tool_call_response(vec![tool_call(&format!("c{i}"), "echo", json!({"text": "again"}))])
            })
            .collect();
        let provider = Arc::new(ScriptedProvider::responses(looping));
        let agent = agent(provider.clone()).with_max_iterations(3);

        let mut conv = Conversation::new();
        let answer = agent.run(&mut conv, "loop forever").await.unwrap();

        assert_eq!(answer, MAX_ITERATIONS_REACHED);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(conv.count_role(Role::Assistant), 3);
        assert_eq!(conv.count_role(Role::Tool), 3);
    }

    #[tokio::test]
    async fn provider_error_propagates_and_keeps_history() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(tool_call_response(vec![tool_call("c", "echo", json!({"text": "x"}))])),
            Err(ProviderError::Network("connection reset".into())),
        ]));
        let agent = agent(provider);

        let mut conv = Conversation::new();
        let err = agent.run(&mut conv, "go").await.unwrap_err();

        assert!(matches!(
            err,
            toolpilot_core::Error::Provider(ProviderError::Network(_))
        ));
        // User, Assistant(tool call), Tool
        assert_eq!(conv.len(), 3);
    }

    #[tokio::test]
    async fn history_accumulates_across_turns() {
        let provider = Arc::new(ScriptedProvider::responses(vec![
            text_response("one"),
            text_response("two"),
        ]));
        let agent = agent(provider.clone());

        let mut conv = Conversation::with_system_prompt("sys");
        agent.run(&mut conv, "first").await.unwrap();
        agent.run(&mut conv, "second").await.unwrap();

        assert_eq!(conv.len(), 5);
        assert_eq!(provider.requests()[1].messages.len(), 4);
    }

    #[test]
    fn defaults() {
        let provider = Arc::new(ScriptedProvider::responses(vec![]));
        let agent = agent(provider);
        assert_eq!(agent.max_iterations(), DEFAULT_MAX_ITERATIONS);
    }
}
