//! Carbon Footprint Agent Service
//!
//! An HTTP service that forwards a prompt to an LLM agent specialized in
//! carbon-footprint analysis of architectural projects, and returns the
//! answer either at once or as a chunked plain-text stream.
//!
//! # Architecture
//!
//! Request → [`request::PromptRequest`] → [`agent::AgentFactory`] →
//! [`adapter`] → `text/plain` response.
//!
//! # Modules
//!
//! - [`adapter`]: agent output to HTTP body (non-streaming, live, buffered)
//! - [`agent`]: per-request agent, tool loop, tools, window, prompt
//! - [`config`]: layered configuration and model settings
//! - [`error`]: HTTP error mapping
//! - [`llm`]: LLM driver traits and implementations
//! - [`normalized`]: driver-level streaming events
//! - [`request`]: request body validation
//! - [`server`]: router and server startup
//! - [`session`]: on-disk per-user, per-session conversation storage

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod adapter;
pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod normalized;
pub mod request;
pub mod server;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use crate::adapter::StreamingMode;
use crate::agent::{AgentFactory, HttpRequestTool};
use crate::config::AppConfig;
use crate::llm::{ChatCompletionsDriver, LlmDriver, LlmSettings};
use crate::session::FileSessionStore;

/// Timeout applied to outbound requests made by the `http_request` tool.
const HTTP_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Builds one agent per request.
    pub factory: Arc<AgentFactory>,
    /// Global configuration.
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("factory", &self.factory)
            .field("streaming_mode", &self.config.agent.streaming_mode)
            .finish()
    }
}

impl AppState {
    /// State around an already configured factory.
    pub fn new(config: Arc<AppConfig>, factory: AgentFactory) -> Self {
        Self {
            factory: Arc::new(factory),
            config,
        }
    }

    /// State talking to the configured model provider.
    ///
    /// In buffered mode every run executes on its own short-lived runtime, so
    /// the HTTP clients are built without idle connection pooling.
    pub fn from_settings(config: Arc<AppConfig>, settings: LlmSettings) -> anyhow::Result<Self> {
        let buffered = config.agent.streaming_mode == StreamingMode::Buffered;

        let driver: Arc<dyn LlmDriver> = if buffered {
            Arc::new(ChatCompletionsDriver::without_pooling(settings)?)
        } else {
            Arc::new(ChatCompletionsDriver::new(settings))
        };

        let mut http = reqwest::Client::builder().timeout(HTTP_TOOL_TIMEOUT);
        if buffered {
            http = http.pool_max_idle_per_host(0);
        }

        let factory = AgentFactory::new(
            driver,
            FileSessionStore::new(&config.agent.sessions_dir),
            config.agent.options(),
        )
        .with_tool(Arc::new(HttpRequestTool::new(http.build()?)));

        Ok(Self::new(config, factory))
    }
}
