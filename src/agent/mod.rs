//! Carbon-footprint agent runtime.
//!
//! An agent is built per request by the [`AgentFactory`], bound to its
//! session, tool set, conversation window and system prompt. It can then be
//! driven to completion ([`CarbonAgent::run`]) or consumed as a lazy event
//! stream ([`CarbonAgent::stream`]).
//!
//! # Architecture
//!
//! - [`events`]: [`AgentEvent`] stream items and the final [`AgentResult`]
//! - [`runner`]: the model/tool loop
//! - [`tools`]: [`AgentTool`] trait, [`ToolSet`] and the built-in tools
//! - [`window`]: sliding-window trimming of the history sent to the model
//! - [`prompt`]: system prompt text
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use carbon_agent::agent::{AgentFactory, AgentMode, AgentOptions};
//! use carbon_agent::llm::ScriptedDriver;
//! use carbon_agent::session::{FileSessionStore, SessionKey};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = Arc::new(ScriptedDriver::new().then_text("42 tCO2e"));
//! let factory = AgentFactory::new(driver, FileSessionStore::new("sessions"), AgentOptions::default());
//!
//! let key = SessionKey::new("alice", "s1")?;
//! let agent = factory.create(&key, AgentMode::Complete).await?;
//! let result = agent.run("How much carbon?").await?;
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod prompt;
pub mod runner;
pub mod tools;
pub mod window;

use std::sync::Arc;

pub use events::{AgentEvent, AgentEventStream, AgentMessage, AgentResult, ContentBlock};
pub use runner::CarbonAgent;
pub use tools::{AgentTool, HttpRequestTool, ReadyToSummarizeTool, ToolSet};
pub use window::SlidingWindow;

use crate::llm::LlmDriver;
use crate::session::{FileSessionStore, SessionError, SessionKey};

/// Failures of an agent run.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The model call failed (network, HTTP status, malformed stream).
    #[error(transparent)]
    Model(#[from] anyhow::Error),

    /// The provider reported an error inside the response stream.
    #[error("{0}")]
    Stream(String),

    /// The model kept calling tools past the iteration limit.
    #[error("maximum tool loop iterations ({0}) exceeded")]
    ToolLoopExceeded(usize),

    /// Loading or persisting the conversation failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The isolated collection context could not be started or panicked.
    #[error("isolated execution failed: {0}")]
    Isolation(String),

    /// The run ended without producing a final message.
    #[error("agent finished without a result")]
    Incomplete,
}

/// How the agent will be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    /// Driven to completion, answer returned at once.
    Complete,
    /// Consumed as an event stream; registers the phase-transition tool.
    Streaming,
}

/// Tunables shared by every agent a factory builds.
#[derive(Debug, Clone, Copy)]
pub struct AgentOptions {
    /// Messages kept by the sliding window.
    pub window_size: usize,
    /// Whether long tool results are truncated before reaching the model.
    pub truncate_tool_results: bool,
    /// Model calls allowed per prompt before giving up.
    pub max_tool_iterations: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            window_size: 20,
            truncate_tool_results: true,
            max_tool_iterations: 10,
        }
    }
}

/// Builds one [`CarbonAgent`] per request.
#[derive(Clone)]
pub struct AgentFactory {
    driver: Arc<dyn LlmDriver>,
    sessions: FileSessionStore,
    options: AgentOptions,
    tools: Vec<Arc<dyn AgentTool>>,
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for AgentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentFactory")
            .field("sessions", &self.sessions)
            .field("options", &self.options)
            .field("tools", &self.tools)
            .finish()
    }
}

impl AgentFactory {
    /// Factory with no tools beyond the phase-transition tool.
    pub fn new(driver: Arc<dyn LlmDriver>, sessions: FileSessionStore, options: AgentOptions) -> Self {
        Self {
            driver,
            sessions,
            options,
            tools: Vec::new(),
        }
    }

    /// Register a tool for every agent, in both modes.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn AgentTool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Tool set an agent in `mode` receives.
    #[must_use]
    pub fn tools_for(&self, mode: AgentMode) -> ToolSet {
        let mut set = ToolSet::new();
        for tool in &self.tools {
            set.insert(Arc::clone(tool));
        }
        if mode == AgentMode::Streaming {
            set.insert(Arc::new(ReadyToSummarizeTool));
        }
        set
    }

    /// Build an agent bound to the session for `key`.
    pub async fn create(&self, key: &SessionKey, mode: AgentMode) -> Result<CarbonAgent, AgentError> {
        let session = self.sessions.open(key).await?;
        Ok(CarbonAgent::new(
            Arc::clone(&self.driver),
            session,
            self.tools_for(mode),
            SlidingWindow::new(self.options.window_size, self.options.truncate_tool_results),
            prompt::system_prompt(mode),
            self.options.max_tool_iterations,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedDriver;

    fn factory() -> AgentFactory {
        AgentFactory::new(
            Arc::new(ScriptedDriver::new()),
            FileSessionStore::new("unused"),
            AgentOptions::default(),
        )
        .with_tool(Arc::new(HttpRequestTool::new(reqwest::Client::new())))
    }

    #[test]
    fn test_signal_tool_only_in_streaming_mode() {
        let factory = factory();

        let complete = factory.tools_for(AgentMode::Complete);
        assert!(complete.contains(tools::HTTP_REQUEST));
        assert!(!complete.contains(tools::READY_TO_SUMMARIZE));

        let streaming = factory.tools_for(AgentMode::Streaming);
        assert!(streaming.contains(tools::HTTP_REQUEST));
        assert!(streaming.contains(tools::READY_TO_SUMMARIZE));
    }

    #[test]
    fn test_model_error_displays_bare_message() {
        let err = AgentError::from(anyhow::anyhow!("upstream unavailable"));
        assert_eq!(err.to_string(), "upstream unavailable");
    }
}
