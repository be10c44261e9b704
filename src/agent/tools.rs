//! Tools the carbon agent may call.
//!
//! Two tools ship with the service:
//!
//! - [`HttpRequestTool`] (`http_request`): fetches emission factors, material
//!   data and similar reference documents over HTTP.
//! - [`ReadyToSummarizeTool`] (`ready_to_summarize`): zero-argument checkpoint
//!   the model calls right before writing its final summary. Only registered
//!   for streaming runs; the HTTP adapter watches for it to switch phase.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};

/// Name of the phase-transition tool.
pub const READY_TO_SUMMARIZE: &str = "ready_to_summarize";

/// Acknowledgement returned to the model by [`ReadyToSummarizeTool`].
pub const READY_TO_SUMMARIZE_ACK: &str = "Agent is now ready to provide the summary.";

/// Name of the HTTP tool.
pub const HTTP_REQUEST: &str = "http_request";

/// Maximum number of characters of a fetched body handed back to the model.
pub const MAX_HTTP_BODY_CHARS: usize = 20_000;

/// A callable capability exposed to the model.
#[async_trait::async_trait]
pub trait AgentTool: Send + Sync + std::fmt::Debug {
    /// Function name the model uses to call the tool.
    fn name(&self) -> &str;
    /// Human readable description included in the tool schema.
    fn description(&self) -> &str;
    /// JSON schema of the arguments object.
    fn schema(&self) -> Value;
    /// Execute the tool.
    async fn call(&self, args: Value) -> anyhow::Result<Value>;
}

/// Tools available to one agent, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, Arc<dyn AgentTool>>,
}

impl ToolSet {
    /// Empty tool set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn insert(&mut self, tool: Arc<dyn AgentTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// True if a tool with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Tool definitions in `OpenAI` function schema format.
    #[must_use]
    pub fn openai_tools_json(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.schema(),
                    }
                })
            })
            .collect()
    }

    /// Call a tool by name.
    pub async fn call(&self, name: &str, args: Value) -> anyhow::Result<Value> {
        let Some(tool) = self.tools.get(name) else {
            anyhow::bail!("unknown tool: {name}");
        };
        tool.call(args).await
    }
}

/// Phase-transition checkpoint tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadyToSummarizeTool;

#[async_trait::async_trait]
impl AgentTool for ReadyToSummarizeTool {
    fn name(&self) -> &str {
        READY_TO_SUMMARIZE
    }

    fn description(&self) -> &str {
        "Call this exactly once, with no arguments, when your analysis is complete \
         and you are about to write the final summary for the user."
    }

    fn schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, _args: Value) -> anyhow::Result<Value> {
        Ok(Value::String(READY_TO_SUMMARIZE_ACK.to_string()))
    }
}

/// Generic HTTP client tool.
#[derive(Debug, Clone)]
pub struct HttpRequestTool {
    http: reqwest::Client,
}

impl HttpRequestTool {
    /// Tool backed by the given client.
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl AgentTool for HttpRequestTool {
    fn name(&self) -> &str {
        HTTP_REQUEST
    }

    fn description(&self) -> &str {
        "Make an HTTP request to an absolute http(s) URL and return the status code, \
         content type and (possibly truncated) response body."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Absolute http or https URL"},
                "method": {"type": "string", "description": "HTTP method, defaults to GET"},
                "headers": {
                    "type": "object",
                    "additionalProperties": {"type": "string"},
                    "description": "Extra request headers"
                },
                "body": {"type": "string", "description": "Request body"}
            },
            "required": ["url"]
        })
    }

    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let Some(raw_url) = args.get("url").and_then(Value::as_str) else {
            anyhow::bail!("missing required argument: url");
        };
        let url = url::Url::parse(raw_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("unsupported URL scheme: {}", url.scheme());
        }

        let method = args
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();
        let method = reqwest::Method::from_bytes(method.as_bytes())?;

        let mut rb = self.http.request(method.clone(), url.clone());
        if let Some(headers) = args.get("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    rb = rb.header(name.as_str(), value);
                }
            }
        }
        if let Some(body) = args.get("body").and_then(Value::as_str) {
            rb = rb.body(body.to_string());
        }

        tracing::debug!(method = %method, url = %url, "http_request tool call");

        let resp = rb.send().await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let text = resp.text().await?;
        let truncated = text.chars().count() > MAX_HTTP_BODY_CHARS;
        let body: String = if truncated {
            text.chars().take(MAX_HTTP_BODY_CHARS).collect()
        } else {
            text
        };

        Ok(json!({
            "status": status,
            "content_type": content_type,
            "body": body,
            "truncated": truncated,
        }))
    }
}
