//! Events and results produced by an agent run.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use super::AgentError;

/// One incremental event of a streaming agent run.
///
/// The set is closed: anything the runner reports that is neither a tool
/// invocation nor model text arrives as [`AgentEvent::Other`] and is ignored
/// by the HTTP adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The agent started invoking a named tool.
    ToolUse {
        /// Name of the tool being invoked.
        tool_name: String,
    },
    /// A fragment of model-generated text.
    Data {
        /// Text fragment, emitted verbatim.
        text: String,
    },
    /// Any other lifecycle notification (tool results, final result, ...).
    Other {
        /// Short label for logging.
        kind: String,
    },
}

impl AgentEvent {
    /// Tool-use event.
    pub fn tool_use(name: impl Into<String>) -> Self {
        Self::ToolUse {
            tool_name: name.into(),
        }
    }

    /// Text event.
    pub fn data(text: impl Into<String>) -> Self {
        Self::Data { text: text.into() }
    }

    /// Ignored lifecycle event.
    pub fn other(kind: impl Into<String>) -> Self {
        Self::Other { kind: kind.into() }
    }
}

/// Boxed stream of agent events.
pub type AgentEventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

/// One block of the final assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Model text.
    Text {
        /// The text.
        text: String,
    },
    /// A tool invocation requested by the model.
    ToolUse {
        /// Call identifier.
        id: String,
        /// Tool name.
        name: String,
        /// Parsed arguments.
        input: serde_json::Value,
    },
    /// The output of a tool invocation.
    ToolResult {
        /// Call identifier this result answers.
        tool_use_id: String,
        /// Tool output.
        content: String,
    },
}

impl ContentBlock {
    /// Text carried by this block, if it is a text block.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::ToolUse { .. } | Self::ToolResult { .. } => None,
        }
    }
}

/// Final assistant message of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Always `assistant` for runner output.
    pub role: String,
    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,
}

/// Outcome of [`CarbonAgent::run`](super::CarbonAgent::run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// The final assistant message.
    pub message: AgentMessage,
    /// Why the run stopped.
    pub stop_reason: String,
}

impl AgentResult {
    /// Result whose final message holds the given blocks.
    #[must_use]
    pub fn from_blocks(content: Vec<ContentBlock>) -> Self {
        Self {
            message: AgentMessage {
                role: "assistant".to_string(),
                content,
            },
            stop_reason: "end_turn".to_string(),
        }
    }
}

impl std::fmt::Display for AgentResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}
