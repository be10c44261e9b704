//! In-process driver that replays canned responses.
//!
//! Each call to [`LlmDriver::stream`] pops the next script. Requests are
//! recorded so tests can assert on what the agent sent to the model.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::normalized::NormalizedEvent;

use super::{EventStream, LlmDriver, LlmRequest};

enum Script {
    Events(Vec<anyhow::Result<NormalizedEvent>>),
    Refuse(String),
}

/// Driver that answers each model call from a queue of scripts.
///
/// # Example
///
/// ```rust
/// use carbon_agent::llm::ScriptedDriver;
///
/// let driver = ScriptedDriver::new()
///     .then_tool_call("ready_to_summarize", "{}")
///     .then_text("Summary");
/// assert_eq!(driver.remaining(), 2);
/// ```
#[derive(Default)]
pub struct ScriptedDriver {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl std::fmt::Debug for ScriptedDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedDriver")
            .field("remaining", &self.remaining())
            .finish_non_exhaustive()
    }
}

impl ScriptedDriver {
    /// Driver with an empty script queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response made of the given events, in order.
    #[must_use]
    pub fn then_events(self, events: Vec<NormalizedEvent>) -> Self {
        self.push(Script::Events(events.into_iter().map(Ok).collect()))
    }

    /// Queue a plain text answer.
    #[must_use]
    pub fn then_text(self, text: &str) -> Self {
        self.then_events(vec![
            NormalizedEvent::MessageDelta {
                text: text.to_string(),
            },
            NormalizedEvent::Done,
        ])
    }

    /// Queue a response that requests a single tool call.
    #[must_use]
    pub fn then_tool_call(self, name: &str, arguments_json: &str) -> Self {
        let index = self.remaining();
        self.then_events(vec![
            NormalizedEvent::ToolCallDelta {
                call_index: 0,
                id: Some(format!("call_{index}")),
                name: Some(name.to_string()),
                arguments_delta: Some(arguments_json.to_string()),
            },
            NormalizedEvent::ToolCallComplete {
                call_index: 0,
                id: format!("call_{index}"),
                name: name.to_string(),
                arguments_json: arguments_json.to_string(),
            },
            NormalizedEvent::Done,
        ])
    }

    /// Queue a response that yields `events` and then breaks with `message`.
    #[must_use]
    pub fn then_stream_error(self, events: Vec<NormalizedEvent>, message: &str) -> Self {
        let mut items: Vec<anyhow::Result<NormalizedEvent>> = events.into_iter().map(Ok).collect();
        items.push(Err(anyhow::anyhow!(message.to_string())));
        self.push(Script::Events(items))
    }

    /// Queue a refusal: the call fails before any event is produced.
    #[must_use]
    pub fn then_refuse(self, message: &str) -> Self {
        self.push(Script::Refuse(message.to_string()))
    }

    /// Number of scripts not yet consumed.
    pub fn remaining(&self) -> usize {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(self, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(script);
        self
    }
}

#[async_trait::async_trait]
impl LlmDriver for ScriptedDriver {
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req);

        let next = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            Some(Script::Events(items)) => Ok(Box::pin(futures::stream::iter(items))),
            Some(Script::Refuse(message)) => Err(anyhow::anyhow!(message)),
            None => anyhow::bail!("scripted driver has no response left"),
        }
    }
}
