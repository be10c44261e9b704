//! File-backed session storage.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::llm::Message;

use super::{SessionError, SessionKey};

const METADATA_FILE: &str = "session.json";
const MESSAGES_FILE: &str = "messages.jsonl";

/// Metadata stored next to a session's messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Owning user.
    pub user_id: String,
    /// Session identifier.
    pub session_id: String,
    /// When the session was first opened.
    pub created_at: DateTime<Utc>,
    /// Last time messages were appended.
    pub updated_at: DateTime<Utc>,
    /// Number of stored messages.
    pub message_count: usize,
}

impl SessionMetadata {
    fn new(key: &SessionKey) -> Self {
        let now = Utc::now();
        Self {
            user_id: key.user_id().to_string(),
            session_id: key.session_id().to_string(),
            created_at: now,
            updated_at: now,
            message_count: 0,
        }
    }
}

/// Root of the on-disk session tree.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    /// Store rooted at `root`. Nothing is created until a session is opened.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open (creating on first use) the session for `key`.
    pub async fn open(&self, key: &SessionKey) -> Result<SessionHandle, SessionError> {
        let dir = self
            .root
            .join(key.user_id())
            .join(format!("session_{}", key.session_id()));

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| io_error(&dir, source))?;

        let handle = SessionHandle {
            key: key.clone(),
            dir,
        };

        let meta_path = handle.metadata_path();
        if !tokio::fs::try_exists(&meta_path)
            .await
            .map_err(|source| io_error(&meta_path, source))?
        {
            handle.save_metadata(&SessionMetadata::new(key)).await?;
            tracing::debug!(session = %key, "Created session");
        }

        Ok(handle)
    }
}

/// An opened session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    key: SessionKey,
    dir: PathBuf,
}

impl SessionHandle {
    /// Key this handle was opened with.
    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Directory holding this session's files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    fn messages_path(&self) -> PathBuf {
        self.dir.join(MESSAGES_FILE)
    }

    /// Read the session metadata.
    pub async fn metadata(&self) -> Result<SessionMetadata, SessionError> {
        let path = self.metadata_path();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| io_error(&path, source))?;
        serde_json::from_str(&content).map_err(|source| SessionError::Corrupt { path, source })
    }

    async fn save_metadata(&self, metadata: &SessionMetadata) -> Result<(), SessionError> {
        let path = self.metadata_path();
        let json = serde_json::to_string_pretty(metadata)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| io_error(&path, source))
    }

    /// Load every stored message, oldest first.
    pub async fn load_messages(&self) -> Result<Vec<Message>, SessionError> {
        let path = self.messages_path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(io_error(&path, source)),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|source| SessionError::Corrupt {
                    path: path.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Append messages and bump the metadata counters.
    pub async fn append_messages(&self, messages: &[Message]) -> Result<(), SessionError> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        for message in messages {
            buf.push_str(&serde_json::to_string(message)?);
            buf.push('\n');
        }

        let path = self.messages_path();
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| io_error(&path, source))?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|source| io_error(&path, source))?;
        file.flush().await.map_err(|source| io_error(&path, source))?;

        let mut metadata = self.metadata().await?;
        metadata.message_count += messages.len();
        metadata.updated_at = Utc::now();
        self.save_metadata(&metadata).await?;

        tracing::debug!(
            session = %self.key,
            appended = messages.len(),
            total = metadata.message_count,
            "Persisted session messages"
        );
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SessionError {
    SessionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key() -> SessionKey {
        SessionKey::new("alice", "s1").unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_layout() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path());
        let handle = store.open(&key()).await.unwrap();

        assert_eq!(handle.dir(), tmp.path().join("alice").join("session_s1"));
        assert!(handle.dir().join("session.json").exists());

        let meta = handle.metadata().await.unwrap();
        assert_eq!(meta.user_id, "alice");
        assert_eq!(meta.session_id, "s1");
        assert_eq!(meta.message_count, 0);
        assert!(handle.load_messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_and_reload_across_handles() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path());

        let first = store.open(&key()).await.unwrap();
        first
            .append_messages(&[Message::user("hi"), Message::assistant(Some("hello".into()), vec![])])
            .await
            .unwrap();

        let second = store.open(&key()).await.unwrap();
        second.append_messages(&[Message::user("again")]).await.unwrap();

        let messages = second.load_messages().await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], Message::user("hi"));
        assert_eq!(messages[2], Message::user("again"));

        let meta = second.metadata().await.unwrap();
        assert_eq!(meta.message_count, 3);
        assert!(meta.updated_at >= meta.created_at);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated_per_key() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path());

        let a = store.open(&key()).await.unwrap();
        a.append_messages(&[Message::user("for a")]).await.unwrap();

        let b = store
            .open(&SessionKey::new("alice", "s2").unwrap())
            .await
            .unwrap();
        assert!(b.load_messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_line_is_reported() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path());
        let handle = store.open(&key()).await.unwrap();
        std::fs::write(handle.dir().join("messages.jsonl"), "not json\n").unwrap();

        let err = handle.load_messages().await.unwrap_err();
        assert!(matches!(err, SessionError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_open_fails_when_root_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("not-a-dir");
        std::fs::write(&root, "x").unwrap();

        let err = FileSessionStore::new(&root).open(&key()).await.unwrap_err();
        assert!(matches!(err, SessionError::Io { .. }));
    }
}
