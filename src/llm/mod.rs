//! LLM driver traits and implementations.
//!
//! This module provides a protocol-agnostic abstraction for streaming model
//! output. The carbon agent only ever talks to an OpenAI-compatible
//! `/chat/completions` endpoint (Gemini exposes one under `/v1beta/openai`).
//!
//! # Overview
//!
//! The [`LlmDriver`] trait defines the streaming interface. The agent runner
//! in [`crate::agent`] builds its tool loop on top of a driver.
//!
//! # Drivers
//!
//! - [`ChatCompletionsDriver`]: OpenAI-compatible Chat Completions over SSE
//! - [`ScriptedDriver`]: replays canned event scripts, used by tests and demos
//!
//! # Example
//!
//! ```rust,ignore
//! use carbon_agent::llm::{LlmSettings, Provider};
//!
//! let settings = LlmSettings {
//!     base_url: "https://generativelanguage.googleapis.com".to_string(),
//!     api_key: Some("...".to_string()),
//!     model: "gemini-2.0-flash".to_string(),
//!     provider: Provider::Gemini,
//!     max_tokens: Some(1000),
//!     temperature: Some(0.7),
//! };
//! ```

pub mod chat_completions;
pub mod provider;
pub mod scripted;

pub use chat_completions::ChatCompletionsDriver;
pub use provider::Provider;
pub use scripted::ScriptedDriver;

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::normalized::NormalizedEvent;

/// Default Gemini endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// LLM connection and model settings.
#[derive(Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API.
    pub base_url: String,
    /// Optional API key for bearer authentication.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Provider type (auto-detected from `base_url`).
    pub provider: Provider,
    /// Upper bound on generated tokens per model call.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

// Hand-written so the API key never ends up in logs.
impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl LlmSettings {
    /// Settings for the default Gemini endpoint and model.
    #[must_use]
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: Some(api_key.into()),
            model: DEFAULT_MODEL.to_string(),
            provider: Provider::Gemini,
            max_tokens: Some(1000),
            temperature: Some(0.7),
        }
    }

    /// Full URL of the chat completions endpoint.
    #[must_use]
    pub fn chat_url(&self) -> String {
        self.provider.build_chat_url(&self.base_url)
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
    /// Tool response.
    Tool,
}

/// A message in a conversation, in Chat Completions wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text content. Absent on assistant messages that only call tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool call this message answers (tool role only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    /// System prompt message.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, text.into())
    }

    /// User message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, text.into())
    }

    /// Assistant message with optional text and tool calls.
    #[must_use]
    pub fn assistant(text: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: text,
            tool_call_id: None,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        }
    }

    /// Tool result message answering `tool_call_id`.
    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }

    fn plain(role: MessageRole, text: String) -> Self {
        Self {
            role,
            content: Some(text),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// True if the assistant requested at least one tool call.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }
}

/// A tool call made by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call.
    pub id: String,
    /// Type of tool (always "function").
    #[serde(rename = "type")]
    pub call_type: String,
    /// Function details.
    pub function: ToolCallFunction,
}

impl ToolCall {
    /// Function-type tool call.
    #[must_use]
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function details in a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    /// Function name.
    pub name: String,
    /// Arguments as JSON string.
    pub arguments: String,
}

/// Request to an LLM driver.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Conversation messages, system prompt first.
    pub messages: Vec<Message>,
    /// Available tools in `OpenAI` function schema format.
    pub tools: Vec<serde_json::Value>,
}

/// Boxed stream of normalized driver events.
pub type EventStream = Pin<Box<dyn Stream<Item = anyhow::Result<NormalizedEvent>> + Send>>;

/// Trait for LLM streaming drivers.
///
/// Implementations of this trait provide streaming access to LLM responses,
/// emitting [`NormalizedEvent`]s as the model generates output.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Stream a response from the LLM.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the connection is interrupted.
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream>;
}
