//! Normalized event types emitted by LLM drivers.
//!
//! Drivers translate provider-specific wire frames into [`NormalizedEvent`]s
//! so the agent loop never has to look at raw provider JSON.
//!
//! # Example
//!
//! ```rust
//! use carbon_agent::normalized::NormalizedEvent;
//!
//! let event = NormalizedEvent::MessageDelta {
//!     text: "Hello".to_string(),
//! };
//! assert_eq!(event.event_name(), "message.delta");
//! ```

use serde::{Deserialize, Serialize};

/// Normalized streaming events produced by an [`LlmDriver`](crate::llm::LlmDriver).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum NormalizedEvent {
    // ─────────────────────────────────────────────────────────────────────
    // Message Content
    // ─────────────────────────────────────────────────────────────────────
    /// Incremental text delta from the assistant's response.
    #[serde(rename = "message.delta")]
    MessageDelta {
        /// The text fragment to append.
        text: String,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Tool Calls
    // ─────────────────────────────────────────────────────────────────────
    /// Incremental tool call delta (streaming tool call assembly).
    #[serde(rename = "tool_call.delta")]
    ToolCallDelta {
        /// Index of this tool call in the current batch.
        call_index: usize,
        /// Tool call ID (may arrive in first delta or later).
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Tool/function name (may arrive in first delta or later).
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Incremental arguments JSON fragment.
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments_delta: Option<String>,
    },

    /// Tool call is fully assembled and ready for execution.
    #[serde(rename = "tool_call.complete")]
    ToolCallComplete {
        /// Index of this tool call in the current batch.
        call_index: usize,
        /// Tool call ID.
        id: String,
        /// Tool/function name.
        name: String,
        /// Complete arguments as JSON string.
        arguments_json: String,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Errors and Completion
    // ─────────────────────────────────────────────────────────────────────
    /// The provider reported an error inside the stream.
    #[serde(rename = "error")]
    Error {
        /// Error message.
        message: String,
        /// Optional error code for programmatic handling.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// The provider finished this response.
    #[serde(rename = "done")]
    Done,
}

impl NormalizedEvent {
    /// Stable name of the event, used as a structured log field.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::MessageDelta { .. } => "message.delta",
            Self::ToolCallDelta { .. } => "tool_call.delta",
            Self::ToolCallComplete { .. } => "tool_call.complete",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }
}
