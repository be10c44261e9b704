//! Model/tool loop of a single agent run.
//!
//! 1. Load the session history and append the user prompt
//! 2. Trim to the sliding window, prepend the system prompt, call the model
//! 3. Surface text deltas and tool invocations as [`AgentEvent`]s
//! 4. Execute requested tools and feed their results back
//! 5. Repeat until the model answers without tool calls
//! 6. Persist the turn and produce the [`AgentResult`]
//!
//! Nothing is persisted when the run fails.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use uuid::Uuid;

use crate::llm::{LlmDriver, LlmRequest, Message, MessageRole, ToolCall};
use crate::normalized::NormalizedEvent;
use crate::session::SessionHandle;

use super::events::{AgentEvent, AgentEventStream, AgentResult, ContentBlock};
use super::tools::ToolSet;
use super::window::SlidingWindow;
use super::AgentError;

/// Internal step of the loop: an observable event or the final result.
enum Step {
    Event(AgentEvent),
    Final(AgentResult),
}

/// A per-request agent.
pub struct CarbonAgent {
    request_id: String,
    driver: Arc<dyn LlmDriver>,
    session: SessionHandle,
    tools: ToolSet,
    window: SlidingWindow,
    system_prompt: String,
    max_tool_iterations: usize,
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for CarbonAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarbonAgent")
            .field("request_id", &self.request_id)
            .field("session", &self.session.key())
            .field("tools", &self.tools.names().collect::<Vec<_>>())
            .field("window", &self.window)
            .field("max_tool_iterations", &self.max_tool_iterations)
            .finish()
    }
}

impl CarbonAgent {
    pub(crate) fn new(
        driver: Arc<dyn LlmDriver>,
        session: SessionHandle,
        tools: ToolSet,
        window: SlidingWindow,
        system_prompt: String,
        max_tool_iterations: usize,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            driver,
            session,
            tools,
            window,
            system_prompt,
            max_tool_iterations: max_tool_iterations.max(1),
        }
    }

    /// Identifier used in log lines of this run.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Run the prompt and return the events lazily.
    ///
    /// The final result is reported as [`AgentEvent::Other`] with kind
    /// `result`. A failure ends the stream with an `Err` item.
    pub fn stream(self, prompt: impl Into<String>) -> AgentEventStream {
        let steps = self.drive(prompt.into());
        Box::pin(steps.map(|step| {
            step.map(|step| match step {
                Step::Event(event) => event,
                Step::Final(_) => AgentEvent::other("result"),
            })
        }))
    }

    /// Run the prompt to completion.
    pub async fn run(self, prompt: impl Into<String>) -> Result<AgentResult, AgentError> {
        let steps = self.drive(prompt.into());
        futures::pin_mut!(steps);

        let mut result = None;
        while let Some(step) = steps.next().await {
            if let Step::Final(final_result) = step? {
                result = Some(final_result);
            }
        }
        result.ok_or(AgentError::Incomplete)
    }

    #[allow(clippy::too_many_lines)]
    fn drive(self, prompt: String) -> impl Stream<Item = Result<Step, AgentError>> + Send + 'static {
        async_stream::try_stream! {
            let agent = self;
            let request_id = agent.request_id.clone();
            let history = agent.session.load_messages().await?;
            let tool_schema = agent.tools.openai_tools_json();

            tracing::info!(
                request_id = %request_id,
                session = %agent.session.key(),
                history_len = history.len(),
                tool_count = tool_schema.len(),
                "Starting agent run"
            );

            let mut turn = vec![Message::user(prompt)];
            let mut final_message = None;

            for iteration in 1..=agent.max_tool_iterations {
                let mut messages = vec![Message::system(agent.system_prompt.as_str())];
                messages.extend(
                    agent
                        .window
                        .apply(history.iter().chain(turn.iter()).cloned().collect()),
                );

                tracing::debug!(
                    request_id = %request_id,
                    iteration = iteration,
                    message_count = messages.len(),
                    "Sending request to LLM driver"
                );

                let mut events = agent
                    .driver
                    .stream(LlmRequest {
                        messages,
                        tools: tool_schema.clone(),
                    })
                    .await?;

                let mut text = String::new();
                let mut announced = BTreeSet::new();
                let mut calls: BTreeMap<usize, ToolCall> = BTreeMap::new();

                while let Some(event) = events.next().await {
                    let event = event?;
                    tracing::trace!(request_id = %request_id, event = event.event_name(), "Driver event");
                    match event {
                        NormalizedEvent::MessageDelta { text: delta } => {
                            text.push_str(&delta);
                            yield Step::Event(AgentEvent::data(delta));
                        }
                        NormalizedEvent::ToolCallDelta { call_index, name: Some(name), .. } => {
                            if !name.is_empty() && announced.insert(call_index) {
                                yield Step::Event(AgentEvent::tool_use(name));
                            }
                        }
                        NormalizedEvent::ToolCallDelta { .. } => {}
                        NormalizedEvent::ToolCallComplete { call_index, id, name, arguments_json } => {
                            if announced.insert(call_index) {
                                yield Step::Event(AgentEvent::tool_use(name.clone()));
                            }
                            calls.insert(call_index, ToolCall::function(id, name, arguments_json));
                        }
                        NormalizedEvent::Error { message, code } => {
                            tracing::error!(
                                request_id = %request_id,
                                iteration = iteration,
                                code = ?code,
                                error = %message,
                                "Provider reported an error"
                            );
                            Err::<(), AgentError>(AgentError::Stream(message))?;
                        }
                        NormalizedEvent::Done => break,
                    }
                }

                let assistant_text = (!text.is_empty()).then_some(text);

                if calls.is_empty() {
                    let message = Message::assistant(assistant_text, Vec::new());
                    turn.push(message.clone());
                    final_message = Some(message);
                    break;
                }

                let tool_calls: Vec<ToolCall> = calls.into_values().collect();
                turn.push(Message::assistant(assistant_text, tool_calls.clone()));

                for call in &tool_calls {
                    let args = serde_json::from_str(&call.function.arguments)
                        .unwrap_or_else(|_| serde_json::json!({}));

                    tracing::info!(
                        request_id = %request_id,
                        iteration = iteration,
                        tool_id = %call.id,
                        tool_name = %call.function.name,
                        "Executing tool call"
                    );

                    let content = match agent.tools.call(&call.function.name, args).await {
                        Ok(serde_json::Value::String(s)) => s,
                        Ok(value) => value.to_string(),
                        Err(e) => {
                            tracing::warn!(
                                request_id = %request_id,
                                tool_name = %call.function.name,
                                error = %e,
                                "Tool call failed"
                            );
                            format!("Error: {e}")
                        }
                    };

                    yield Step::Event(AgentEvent::other("tool_result"));
                    turn.push(Message::tool(call.id.clone(), content));
                }
            }

            let Some(final_message) = final_message else {
                tracing::error!(
                    request_id = %request_id,
                    max_iterations = agent.max_tool_iterations,
                    "Maximum tool loop iterations exceeded"
                );
                Err::<(), AgentError>(AgentError::ToolLoopExceeded(agent.max_tool_iterations))?;
                return;
            };

            agent.session.append_messages(&turn).await?;

            tracing::info!(
                request_id = %request_id,
                persisted = turn.len(),
                "Agent run completed"
            );

            yield Step::Final(AgentResult::from_blocks(content_blocks(&final_message)));
        }
    }
}

/// Content blocks describing one conversation message.
#[must_use]
pub fn content_blocks(message: &Message) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    match message.role {
        MessageRole::Tool => {
            blocks.push(ContentBlock::ToolResult {
                tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
                content: message.content.clone().unwrap_or_default(),
            });
        }
        MessageRole::System | MessageRole::User | MessageRole::Assistant => {
            if let Some(text) = &message.content {
                blocks.push(ContentBlock::Text { text: text.clone() });
            }
            for call in message.tool_calls.iter().flatten() {
                blocks.push(ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    input: serde_json::from_str(&call.function.arguments)
                        .unwrap_or(serde_json::Value::Null),
                });
            }
        }
    }
    blocks
}
