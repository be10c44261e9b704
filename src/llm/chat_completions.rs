//! OpenAI-compatible Chat Completions driver.
//!
//! This module implements the [`LlmDriver`] trait for `/chat/completions`
//! endpoints, supporting streaming responses and tool calls. Frame parsing
//! lives in [`FrameDecoder`] so it can be exercised without a network.

use std::collections::BTreeMap;

use futures::StreamExt;

use crate::normalized::NormalizedEvent;

use super::{EventStream, LlmDriver, LlmRequest, LlmSettings};

/// Accumulated state for a streaming tool call.
#[derive(Debug, Default)]
struct ToolAccum {
    id: Option<String>,
    name: Option<String>,
    args: String,
}

/// Incremental decoder for Chat Completions SSE bodies.
///
/// Bytes are fed as they arrive; complete `data:` frames are turned into
/// [`NormalizedEvent`]s. Tool call fragments are assembled per `index` and
/// flushed as [`NormalizedEvent::ToolCallComplete`] when the choice reports a
/// `finish_reason`, when `[DONE]` arrives, or when the body ends.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    tool_accum: BTreeMap<usize, ToolAccum>,
    done: bool,
}

impl FrameDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the response body and return the events it completes.
    ///
    /// # Errors
    ///
    /// Returns an error if a `data:` payload is not valid JSON.
    pub fn feed(&mut self, chunk: &[u8]) -> anyhow::Result<Vec<NormalizedEvent>> {
        self.buf.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut out = Vec::new();
        while let Some(pos) = find_double_newline(&self.buf) {
            let frame = self.buf.drain(..pos + 2).collect::<Vec<_>>();
            self.decode_frame(&frame, &mut out)?;
        }
        Ok(out)
    }

    /// Flush whatever is left once the body has ended.
    ///
    /// Always terminates the sequence with [`NormalizedEvent::Done`] unless
    /// the provider already sent `[DONE]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the trailing frame is not valid JSON.
    pub fn finish(&mut self) -> anyhow::Result<Vec<NormalizedEvent>> {
        let mut out = Vec::new();
        if !self.buf.is_empty() {
            let frame = std::mem::take(&mut self.buf);
            self.decode_frame(&frame, &mut out)?;
        }
        if !self.done {
            self.flush_tools(&mut out);
            out.push(NormalizedEvent::Done);
            self.done = true;
        }
        Ok(out)
    }

    fn decode_frame(&mut self, frame: &[u8], out: &mut Vec<NormalizedEvent>) -> anyhow::Result<()> {
        let text = String::from_utf8_lossy(frame);

        for line in text.lines() {
            if self.done {
                break;
            }
            let line = line.trim();
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                self.flush_tools(out);
                out.push(NormalizedEvent::Done);
                self.done = true;
                continue;
            }

            let v: serde_json::Value = serde_json::from_str(data)?;

            // Some gateways report failures as an in-stream error object
            if let Some(err) = v.get("error") {
                out.push(NormalizedEvent::Error {
                    message: err
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map_or_else(|| err.to_string(), ToString::to_string),
                    code: err.get("code").map(|c| match c.as_str() {
                        Some(s) => s.to_string(),
                        None => c.to_string(),
                    }),
                });
                continue;
            }

            let choice = &v["choices"][0];
            let delta = &choice["delta"];

            if let Some(s) = delta.get("content").and_then(|x| x.as_str())
                && !s.is_empty()
            {
                out.push(NormalizedEvent::MessageDelta {
                    text: s.to_string(),
                });
            }

            if let Some(arr) = delta.get("tool_calls").and_then(|x| x.as_array()) {
                for tc in arr {
                    let idx = tc
                        .get("index")
                        .and_then(serde_json::Value::as_u64)
                        .and_then(|i| usize::try_from(i).ok())
                        .unwrap_or(0);
                    let id = tc.get("id").and_then(|x| x.as_str()).map(ToString::to_string);
                    let function = tc.get("function");
                    let name = function
                        .and_then(|f| f.get("name"))
                        .and_then(|x| x.as_str())
                        .map(ToString::to_string);
                    let args_delta = function
                        .and_then(|f| f.get("arguments"))
                        .and_then(|x| x.as_str())
                        .map(ToString::to_string);

                    let entry = self.tool_accum.entry(idx).or_default();
                    if entry.id.is_none() {
                        entry.id.clone_from(&id);
                    }
                    if entry.name.is_none() {
                        entry.name.clone_from(&name);
                    }
                    if let Some(ad) = &args_delta {
                        entry.args.push_str(ad);
                    }

                    out.push(NormalizedEvent::ToolCallDelta {
                        call_index: idx,
                        id,
                        name,
                        arguments_delta: args_delta,
                    });
                }
            }

            // Gemini reports "stop" even when the turn ends in tool calls
            if choice.get("finish_reason").and_then(|x| x.as_str()).is_some() {
                self.flush_tools(out);
            }
        }
        Ok(())
    }

    fn flush_tools(&mut self, out: &mut Vec<NormalizedEvent>) {
        for (idx, accum) in std::mem::take(&mut self.tool_accum) {
            let Some(name) = accum.name else {
                continue;
            };
            let arguments_json = if accum.args.trim().is_empty() {
                "{}".to_string()
            } else {
                accum.args
            };
            out.push(NormalizedEvent::ToolCallComplete {
                call_index: idx,
                id: accum.id.unwrap_or_else(|| format!("call_{idx}")),
                name,
                arguments_json,
            });
        }
    }
}

/// Driver for OpenAI-compatible Chat Completions endpoints.
#[derive(Clone)]
pub struct ChatCompletionsDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDriver")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ChatCompletionsDriver {
    /// Create a new Chat Completions driver with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    /// Create a driver whose client never keeps idle connections.
    ///
    /// Required when each request runs on its own short-lived runtime:
    /// pooled connections would outlive the runtime that drives them.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn without_pooling(settings: LlmSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self { http, settings })
    }

    fn request_body(&self, req: LlmRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.settings.model,
            "stream": true,
            "messages": req.messages,
        });
        if !req.tools.is_empty() {
            body["tools"] = serde_json::Value::Array(req.tools);
        }
        if let Some(max_tokens) = self.settings.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }
        if let Some(temperature) = self.settings.temperature {
            body["temperature"] = temperature.into();
        }
        body
    }
}

#[async_trait::async_trait]
impl LlmDriver for ChatCompletionsDriver {
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream> {
        let url = self.settings.chat_url();
        let body = self.request_body(req);

        tracing::debug!(url = %url, model = %self.settings.model, "Sending chat completions request");

        let mut rb = self.http.post(&url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("LLM request failed with status {status}: {detail}");
        }
        let byte_stream = resp.bytes_stream();

        let out = async_stream::try_stream! {
            let mut decoder = FrameDecoder::new();

            futures::pin_mut!(byte_stream);
            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk?;
                for event in decoder.feed(&chunk)? {
                    yield event;
                }
            }
            for event in decoder.finish()? {
                yield event;
            }
        };

        Ok(Box::pin(out))
    }
}

/// Find the position of a double newline in the buffer.
fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}
