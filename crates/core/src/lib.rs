//! # Toolpilot Core
//!
//! Domain types, traits, and error definitions for the Toolpilot agent loop.
//! This crate performs no I/O: it defines the model that the provider, tool,
//! agent and CLI crates implement against.
//!
//! - [`message`]: messages and the append-only conversation
//! - [`provider`]: the external model collaborator
//! - [`tool`] and [`schema`]: tools, their declarative input schemas, and the registry

pub mod error;
pub mod message;
pub mod provider;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use schema::{FieldSpec, FieldType, SchemaViolation, ToolSchema};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
