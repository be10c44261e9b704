//! HTTP error mapping.
//!
//! | Error | Status | Body |
//! |---|---|---|
//! | [`ApiError::Request`] | 400 | `{"detail": "..."}` |
//! | [`ApiError::Agent`] | 500 | `Error: {message}` as `text/plain` |
//! | [`ApiError::Setup`] | 500 | `{"detail": "..."}` |

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::agent::AgentError;
use crate::request::RequestError;

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable description.
    pub detail: String,
}

/// Errors returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body was rejected.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The agent failed while producing a non-streaming answer.
    #[error(transparent)]
    Agent(AgentError),

    /// The agent could not be built (session store unavailable, ...).
    #[error(transparent)]
    Setup(AgentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Request(e) => {
                tracing::debug!(error = %e, "Rejected request");
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        detail: e.to_string(),
                    }),
                )
                    .into_response()
            }
            Self::Agent(e) => {
                tracing::error!(error = %e, "Agent run failed");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}")).into_response()
            }
            Self::Setup(e) => {
                tracing::error!(error = %e, "Agent setup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        detail: e.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_request_error_is_400_json() {
        let response = ApiError::from(RequestError::EmptyPrompt).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = serde_json::from_str(&body_of(response).await).unwrap();
        assert_eq!(body.detail, "No prompt provided in the request.");
    }

    #[tokio::test]
    async fn test_agent_error_is_500_text() {
        let err = AgentError::from(anyhow::anyhow!("upstream unavailable"));
        let response = ApiError::Agent(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await, "Error: upstream unavailable");
    }
}
