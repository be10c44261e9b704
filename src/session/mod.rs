//! Per-user, per-session conversation persistence.
//!
//! Conversations are stored on disk so that a follow-up prompt with the same
//! `(user_id, session_id)` continues where the previous one stopped.
//!
//! # Architecture
//!
//! - [`SessionKey`]: validated `(user_id, session_id)` pair, safe to use as
//!   path components
//! - [`FileSessionStore`]: root directory holding every user's sessions
//! - [`SessionHandle`]: one opened session; loads and appends messages
//!
//! # Layout
//!
//! ```text
//! <root>/<user_id>/session_<session_id>/session.json     metadata
//! <root>/<user_id>/session_<session_id>/messages.jsonl   one message per line
//! ```
//!
//! Two requests writing the same session at once may interleave their turns.
//! Nothing here serializes them.
//!
//! # Example
//!
//! ```rust,no_run
//! use carbon_agent::session::{FileSessionStore, SessionKey};
//!
//! # async fn demo() -> Result<(), carbon_agent::session::SessionError> {
//! let store = FileSessionStore::new("sessions");
//! let key = SessionKey::new("alice", "project-1")?;
//! let session = store.open(&key).await?;
//! let history = session.load_messages().await?;
//! # Ok(())
//! # }
//! ```

mod store;

use std::path::PathBuf;

pub use store::{FileSessionStore, SessionHandle, SessionMetadata};

/// Longest accepted user or session identifier.
pub const MAX_KEY_LEN: usize = 128;

/// Errors raised by the session store.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A user or session identifier cannot be used as a path component.
    #[error("invalid {field}: {reason}")]
    InvalidKey {
        /// Which identifier was rejected.
        field: &'static str,
        /// Human readable reason.
        reason: String,
    },

    /// Filesystem failure.
    #[error("session storage error at {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A stored line or metadata file could not be parsed.
    #[error("corrupt session data at {}: {source}", path.display())]
    Corrupt {
        /// File holding the bad data.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A message could not be serialized.
    #[error("failed to serialize session data: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Validated `(user_id, session_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    user_id: String,
    session_id: String,
}

impl SessionKey {
    /// Validate both identifiers.
    ///
    /// Any string that stays a single path component is accepted: non-empty,
    /// at most [`MAX_KEY_LEN`] bytes, not `.` or `..`, and free of `/`, `\`,
    /// NUL and other control characters.
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Result<Self, SessionError> {
        let user_id = user_id.into();
        let session_id = session_id.into();
        check_component("user_id", &user_id)?;
        check_component("session_id", &session_id)?;
        Ok(Self { user_id, session_id })
    }

    /// The user identifier.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.user_id, self.session_id)
    }
}

fn check_component(field: &'static str, value: &str) -> Result<(), SessionError> {
    let reject = |reason: &str| {
        Err(SessionError::InvalidKey {
            field,
            reason: reason.to_string(),
        })
    };

    if value.is_empty() {
        return reject("must not be empty");
    }
    if value.len() > MAX_KEY_LEN {
        return reject("is too long");
    }
    if value == "." || value == ".." {
        return reject("must not be a relative path segment");
    }
    if value.contains(['/', '\\']) {
        return reject("must not contain path separators");
    }
    if value.chars().any(char::is_control) {
        return reject("must not contain control characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_identifiers() {
        let key = SessionKey::new("user-1", "session_2.a").unwrap();
        assert_eq!(key.user_id(), "user-1");
        assert_eq!(key.session_id(), "session_2.a");
        assert_eq!(key.to_string(), "user-1/session_2.a");
    }

    #[test]
    fn test_accepts_free_form_identifiers() {
        for (user, session) in [
            ("alice@example.com", "2024 Q1"),
            ("José", "projet été"),
            ("a..b", "v1.2"),
        ] {
            let key = SessionKey::new(user, session).unwrap();
            assert_eq!(key.user_id(), user);
            assert_eq!(key.session_id(), session);
        }
    }

    #[test]
    fn test_rejects_traversal_and_separators() {
        for bad in ["..", ".", "../etc", "a/b", "a\\b", "", "a\0b", "line\nbreak"] {
            let err = SessionKey::new(bad, "s").unwrap_err();
            assert!(
                matches!(err, SessionError::InvalidKey { field: "user_id", .. }),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_overlong_session_id() {
        let long = "x".repeat(MAX_KEY_LEN + 1);
        let err = SessionKey::new("u", long).unwrap_err();
        assert!(matches!(err, SessionError::InvalidKey { field: "session_id", .. }));
    }
}
