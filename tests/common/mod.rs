#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use carbon_agent::AppState;
use carbon_agent::adapter::StreamingMode;
use carbon_agent::agent::{AgentFactory, AgentTool};
use carbon_agent::config::AppConfig;
use carbon_agent::llm::{LlmDriver, ScriptedDriver};
use carbon_agent::normalized::NormalizedEvent;
use carbon_agent::server::router;
use carbon_agent::session::FileSessionStore;
use serde_json::{Value, json};
use tempfile::TempDir;

/// `http_request` stand-in that answers without touching the network.
#[derive(Debug)]
pub struct StubHttpTool;

#[async_trait::async_trait]
impl AgentTool for StubHttpTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Offline HTTP stub"
    }

    fn schema(&self) -> Value {
        json!({"type": "object", "properties": {"url": {"type": "string"}}})
    }

    async fn call(&self, _args: Value) -> anyhow::Result<Value> {
        Ok(json!({"status": 200, "body": "concrete: 0.1 tCO2e/m3"}))
    }
}

/// A running test app plus the scratch directory backing it.
pub struct TestApp {
    pub server: TestServer,
    pub driver: Arc<ScriptedDriver>,
    pub dir: TempDir,
}

/// Build the app around `driver` with sessions stored in a temp directory.
pub fn app(driver: ScriptedDriver, mode: StreamingMode) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let sessions = dir.path().join("sessions");
    app_with_sessions(driver, mode, sessions.to_string_lossy().into_owned(), dir)
}

/// Build the app with an explicit sessions root.
pub fn app_with_sessions(
    driver: ScriptedDriver,
    mode: StreamingMode,
    sessions_dir: String,
    dir: TempDir,
) -> TestApp {
    let mut config = AppConfig::default();
    config.agent.streaming_mode = mode;
    config.agent.sessions_dir = sessions_dir;
    config.server.index_file = dir.path().join("index.html").to_string_lossy().into_owned();
    config.server.static_dir = dir.path().join("static").to_string_lossy().into_owned();

    let driver = Arc::new(driver);
    let model: Arc<dyn LlmDriver> = Arc::clone(&driver) as Arc<dyn LlmDriver>;
    let factory = AgentFactory::new(
        model,
        FileSessionStore::new(&config.agent.sessions_dir),
        config.agent.options(),
    )
    .with_tool(Arc::new(StubHttpTool));

    let server = TestServer::new(router(AppState::new(Arc::new(config), factory))).unwrap();
    TestApp { server, driver, dir }
}

/// Script for: tool use, some reasoning text, the phase signal, the summary.
pub fn scenario_driver() -> ScriptedDriver {
    ScriptedDriver::new()
        .then_tool_call("http_request", r#"{"url": "https://example.org/factors"}"#)
        .then_events(vec![
            NormalizedEvent::MessageDelta {
                text: "Hello ".to_string(),
            },
            NormalizedEvent::ToolCallComplete {
                call_index: 0,
                id: "call_signal".to_string(),
                name: "ready_to_summarize".to_string(),
                arguments_json: "{}".to_string(),
            },
            NormalizedEvent::Done,
        ])
        .then_text("World")
}

pub fn body(prompt: &str, user_id: &str, session_id: &str) -> Value {
    json!({"prompt": prompt, "user_id": user_id, "session_id": session_id})
}
