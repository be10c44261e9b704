//! Inbound prompt requests.
//!
//! A body is decoded and validated in one step; nothing touches the agent or
//! the session store until [`PromptRequest::from_json`] has succeeded.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::Deserialize;

use crate::error::ApiError;
use crate::session::SessionKey;

/// Message returned for a missing or blank prompt.
pub const EMPTY_PROMPT_MESSAGE: &str = "No prompt provided in the request.";

/// Why a request body was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// Malformed JSON, missing fields, or unusable identifiers.
    #[error("{0}")]
    Validation(String),

    /// The prompt is empty or whitespace only.
    #[error("{}", EMPTY_PROMPT_MESSAGE)]
    EmptyPrompt,
}

#[derive(Debug, Deserialize)]
struct RawPromptRequest {
    prompt: String,
    user_id: String,
    session_id: String,
}

/// A validated prompt request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    prompt: String,
    key: SessionKey,
}

impl PromptRequest {
    /// Decode and validate a JSON body.
    ///
    /// A blank prompt is reported as [`RequestError::EmptyPrompt`] even when
    /// the identifiers are also invalid.
    pub fn from_json(body: &[u8]) -> Result<Self, RequestError> {
        let raw: RawPromptRequest = serde_json::from_slice(body)
            .map_err(|e| RequestError::Validation(format!("Invalid request body: {e}")))?;

        if raw.prompt.trim().is_empty() {
            return Err(RequestError::EmptyPrompt);
        }

        let key = SessionKey::new(raw.user_id, raw.session_id)
            .map_err(|e| RequestError::Validation(e.to_string()))?;

        Ok(Self {
            prompt: raw.prompt,
            key,
        })
    }

    /// The prompt text, as sent.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Session the prompt belongs to.
    #[must_use]
    pub fn session_key(&self) -> &SessionKey {
        &self.key
    }

    /// Consume the request, returning the prompt.
    #[must_use]
    pub fn into_prompt(self) -> String {
        self.prompt
    }
}

impl<S> FromRequest<S> for PromptRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| RequestError::Validation(e.body_text()))?;
        Ok(Self::from_json(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let req = PromptRequest::from_json(
            br#"{"prompt": "Analyze https://example.org", "user_id": "u1", "session_id": "s1"}"#,
        )
        .unwrap();
        assert_eq!(req.prompt(), "Analyze https://example.org");
        assert_eq!(req.session_key().user_id(), "u1");
        assert_eq!(req.session_key().session_id(), "s1");
    }

    #[test]
    fn test_blank_prompts_are_rejected() {
        for prompt in ["", "   ", "\n\t"] {
            let body = serde_json::json!({"prompt": prompt, "user_id": "u", "session_id": "s"});
            let err = PromptRequest::from_json(body.to_string().as_bytes()).unwrap_err();
            assert_eq!(err, RequestError::EmptyPrompt);
            assert_eq!(err.to_string(), EMPTY_PROMPT_MESSAGE);
        }
    }

    #[test]
    fn test_empty_prompt_wins_over_bad_identifiers() {
        let err = PromptRequest::from_json(br#"{"prompt": "", "user_id": "../x", "session_id": "s"}"#)
            .unwrap_err();
        assert_eq!(err, RequestError::EmptyPrompt);
    }

    #[test]
    fn test_malformed_and_missing_fields() {
        assert!(matches!(
            PromptRequest::from_json(b"{not json"),
            Err(RequestError::Validation(_))
        ));
        assert!(matches!(
            PromptRequest::from_json(br#"{"prompt": "hi"}"#),
            Err(RequestError::Validation(_))
        ));
        assert!(matches!(
            PromptRequest::from_json(br#"{"prompt": 5, "user_id": "u", "session_id": "s"}"#),
            Err(RequestError::Validation(_))
        ));
    }

    #[test]
    fn test_free_form_identifiers_are_accepted() {
        let req = PromptRequest::from_json(
            br#"{"prompt": "hi", "user_id": "alice@example.com", "session_id": "2024 Q1"}"#,
        )
        .unwrap();
        assert_eq!(req.session_key().user_id(), "alice@example.com");
        assert_eq!(req.session_key().session_id(), "2024 Q1");
    }

    #[test]
    fn test_unsafe_session_identifiers() {
        let err = PromptRequest::from_json(br#"{"prompt": "hi", "user_id": "u", "session_id": "../etc"}"#)
            .unwrap_err();
        match err {
            RequestError::Validation(msg) => assert!(msg.contains("session_id")),
            RequestError::EmptyPrompt => panic!("expected validation error"),
        }
    }
}
