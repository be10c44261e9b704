use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, get_service, post},
};
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::adapter::render_result;
use crate::agent::AgentMode;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::llm::LlmSettings;
use crate::request::PromptRequest;

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, settings: LlmSettings) -> anyhow::Result<()> {
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        provider = ?settings.provider,
        "LLM configuration loaded"
    );

    let state = AppState::from_settings(Arc::clone(&config), settings)?;
    let app = router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        streaming_mode = %config.agent.streaming_mode,
        sessions_dir = %config.agent.sessions_dir,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let mut app = Router::new()
        .route("/", get_service(ServeFile::new(&config.server.index_file)))
        .route("/health", get(health))
        .route("/carbon", post(carbon))
        .route("/carbon-streaming", post(carbon_streaming))
        .nest_service("/static", ServeDir::new(&config.server.static_dir))
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes));

    if let Some(timeout_duration) = request_timeout(config.server.request_timeout_secs) {
        app = app.layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(timeout_duration, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ));
    }

    app.layer(cors_layer(&config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Per-request deadline; `0` means no timeout middleware at all.
fn request_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// CORS policy for the configured origins.
///
/// `*` anywhere in the list allows any origin without credentials;
/// otherwise only the listed origins are allowed, with credentials.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /health - Liveness probe for load balancers.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy"}))
}

/// POST /carbon - Run the agent to completion and return its answer.
async fn carbon(
    State(state): State<AppState>,
    request: PromptRequest,
) -> Result<String, ApiError> {
    tracing::info!(
        user_id = %request.session_key().user_id(),
        session_id = %request.session_key().session_id(),
        prompt_length = request.prompt().len(),
        "Received carbon request"
    );

    let agent = state
        .factory
        .create(request.session_key(), AgentMode::Complete)
        .await
        .map_err(ApiError::Agent)?;
    tracing::debug!(request_id = %agent.request_id(), "Agent created");

    let result = agent
        .run(request.into_prompt())
        .await
        .map_err(ApiError::Agent)?;

    Ok(render_result(&result))
}

/// POST /carbon-streaming - Stream the agent's output as plain-text chunks.
async fn carbon_streaming(
    State(state): State<AppState>,
    request: PromptRequest,
) -> Result<Response, ApiError> {
    let mode = state.config.agent.streaming_mode;

    tracing::info!(
        user_id = %request.session_key().user_id(),
        session_id = %request.session_key().session_id(),
        prompt_length = request.prompt().len(),
        streaming_mode = %mode,
        "Received streaming carbon request"
    );

    let agent = state
        .factory
        .create(request.session_key(), AgentMode::Streaming)
        .await
        .map_err(ApiError::Setup)?;
    tracing::debug!(request_id = %agent.request_id(), "Agent created");

    let chunks = mode.chunks(agent.stream(request.into_prompt()));

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(chunks.map(Ok::<_, Infallible>)),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentFactory, AgentOptions};
    use crate::llm::ScriptedDriver;
    use crate::session::FileSessionStore;
    use tower::ServiceExt;

    fn state(request_timeout_secs: u64) -> AppState {
        let mut config = AppConfig::default();
        config.server.request_timeout_secs = request_timeout_secs;
        let factory = AgentFactory::new(
            Arc::new(ScriptedDriver::new()),
            FileSessionStore::new("unused"),
            AgentOptions::default(),
        );
        AppState::new(Arc::new(config), factory)
    }

    #[test]
    fn test_zero_timeout_disables_middleware() {
        assert_eq!(request_timeout(0), None);
        assert_eq!(request_timeout(300), Some(Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn test_router_serves_with_and_without_timeout() {
        for secs in [0, 300] {
            let response = router(state(secs))
                .oneshot(
                    axum::http::Request::builder()
                        .uri("/health")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[test]
    fn test_cors_layer_builds_for_default_and_explicit_origins() {
        let config = AppConfig::default();
        let _ = cors_layer(&config.server.cors_origins);
        let _ = cors_layer(&["http://localhost:8000".to_string(), "null".to_string()]);
    }
}
