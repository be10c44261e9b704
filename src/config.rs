//! Service configuration.
//!
//! Layers, lowest priority first:
//!
//! 1. Built-in defaults ([`AppConfig::default`])
//! 2. A config file: `--config`/`CONFIG_FILE` if given, else `./config.{yaml,toml,json}` when present
//! 3. `CARBON_`-prefixed environment variables, `__` between sections
//!    (e.g. `CARBON_SERVER__PORT=9000`, `CARBON_SERVER__CORS_ORIGINS=http://a,http://b`)
//! 4. Command line flags and their plain env fallbacks (`PORT`, `STREAMING_MODE`, ...)
//!
//! Model credentials are not part of [`AppConfig`]; they come from
//! [`load_llm_settings`].

use std::path::PathBuf;

use clap::Parser;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::adapter::StreamingMode;
use crate::agent::AgentOptions;
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL, LlmSettings, Provider};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Deployment shape of /carbon-streaming
    #[arg(long, env = "STREAMING_MODE", value_enum)]
    pub streaming_mode: Option<StreamingMode>,

    /// Root directory for session files
    #[arg(long, env = "SESSIONS_DIR")]
    pub sessions_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Directory served under `/static`.
    pub static_dir: String,
    /// Document served at `/`.
    pub index_file: String,
    /// Per-request timeout. `0` disables the timeout middleware.
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
    /// Allowed CORS origins. `*` allows any origin (without credentials).
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
            static_dir: "static".to_string(),
            index_file: "static/index.html".to_string(),
            request_timeout_secs: 300,
            body_limit_bytes: 1024 * 1024,
            cors_origins: [
                "*",
                "http://localhost",
                "http://localhost:8000",
                "http://127.0.0.1",
                "http://127.0.0.1:8000",
                "null",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub streaming_mode: StreamingMode,
    pub sessions_dir: String,
    pub window_size: usize,
    pub truncate_tool_results: bool,
    pub max_tool_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let options = AgentOptions::default();
        Self {
            streaming_mode: StreamingMode::default(),
            sessions_dir: "sessions".to_string(),
            window_size: options.window_size,
            truncate_tool_results: options.truncate_tool_results,
            max_tool_iterations: options.max_tool_iterations,
        }
    }
}

impl AgentConfig {
    /// Options handed to the agent factory.
    #[must_use]
    pub fn options(&self) -> AgentOptions {
        AgentOptions {
            window_size: self.window_size,
            truncate_tool_results: self.truncate_tool_results,
            max_tool_iterations: self.max_tool_iterations,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        // 1. Defaults
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        // 2. Config file
        builder = match &cli.config {
            Some(path) => builder.add_source(File::from(PathBuf::from(path)).required(true)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // 3. Prefixed environment, e.g. CARBON_AGENT__WINDOW_SIZE=30
        builder = builder.add_source(
            Environment::with_prefix("CARBON")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("server.cors_origins"),
        );

        // 4. CLI flags (and their env fallbacks)
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(mode) = cli.streaming_mode {
            builder = builder.set_override("agent.streaming_mode", mode.to_string())?;
        }
        if let Some(dir) = cli.sessions_dir {
            builder = builder.set_override("agent.sessions_dir", dir)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }

    /// `host:port` to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Problems with the model settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Missing required env var: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Model settings from the process environment.
///
/// `GEMINI_API_KEY` is required. `LLM_BASE_URL`, `LLM_MODEL`,
/// `LLM_MAX_TOKENS` and `LLM_TEMPERATURE` override the Gemini defaults.
pub fn load_llm_settings() -> Result<LlmSettings, SettingsError> {
    llm_settings_from(|name| std::env::var(name).ok())
}

/// Model settings from an arbitrary variable lookup.
pub fn llm_settings_from<F>(lookup: F) -> Result<LlmSettings, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let api_key = var("GEMINI_API_KEY").ok_or(SettingsError::Missing("GEMINI_API_KEY"))?;

    let base_url = var("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    if url::Url::parse(&base_url).is_err() {
        return Err(SettingsError::Invalid {
            name: "LLM_BASE_URL",
            value: base_url,
        });
    }

    let model = var("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let max_tokens = var("LLM_MAX_TOKENS").map_or(Ok(1000), |raw| parse_var("LLM_MAX_TOKENS", &raw))?;
    let temperature = var("LLM_TEMPERATURE").map_or(Ok(0.7), |raw| parse_var("LLM_TEMPERATURE", &raw))?;

    Ok(LlmSettings {
        provider: Provider::detect_from_url(&base_url),
        base_url,
        api_key: Some(api_key),
        model,
        max_tokens: Some(max_tokens),
        temperature: Some(temperature),
    })
}

fn parse_var<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, SettingsError> {
    raw.trim().parse().ok().ok_or_else(|| SettingsError::Invalid {
        name,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = llm_settings_from(lookup(&[])).unwrap_err();
        assert_eq!(err, SettingsError::Missing("GEMINI_API_KEY"));
        assert_eq!(err.to_string(), "Missing required env var: GEMINI_API_KEY");

        let blank = llm_settings_from(lookup(&[("GEMINI_API_KEY", "  ")])).unwrap_err();
        assert_eq!(blank, SettingsError::Missing("GEMINI_API_KEY"));
    }

    #[test]
    fn test_gemini_defaults() {
        let settings = llm_settings_from(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(settings.provider, Provider::Gemini);
        assert_eq!(settings.model, "gemini-2.0-flash");
        assert_eq!(settings.max_tokens, Some(1000));
        assert_eq!(settings.temperature, Some(0.7));
        assert_eq!(
            settings.chat_url(),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let settings = llm_settings_from(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("LLM_BASE_URL", "http://127.0.0.1:9000/v1"),
            ("LLM_MODEL", "local-model"),
            ("LLM_MAX_TOKENS", "256"),
        ]))
        .unwrap();
        assert_eq!(settings.provider, Provider::Generic);
        assert_eq!(settings.model, "local-model");
        assert_eq!(settings.max_tokens, Some(256));
        assert_eq!(settings.chat_url(), "http://127.0.0.1:9000/v1/chat/completions");

        let err = llm_settings_from(lookup(&[("GEMINI_API_KEY", "k"), ("LLM_TEMPERATURE", "hot")]))
            .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { name: "LLM_TEMPERATURE", .. }));
    }

    #[test]
    fn test_defaults_match_service_contract() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.cors_origins.len(), 6);
        assert_eq!(config.agent.streaming_mode, StreamingMode::Live);
        assert_eq!(config.agent.window_size, 20);
        assert!(config.agent.truncate_tool_results);
    }
}
