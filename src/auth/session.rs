use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::oauth::PendingSignIn;
use crate::models::types::UtcDateTime;

const SESSION_FILE: &str = "session.json";

/// A signed-in identity as issued by the managed auth service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub uid: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: UtcDateTime,
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthSession {
    pub fn is_expired(&self, now: UtcDateTime) -> bool {
        !now.is_before(self.expires_at)
    }
}

/// Everything kept between invocations, the equivalent of browser session storage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub pending_sign_in: Option<PendingSignIn>,
    #[serde(default)]
    pub session: Option<AuthSession>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Could not access session file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Corrupted session file {path}: {source}")]
    Corrupted {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<SessionState, SessionError>;

    async fn save(&self, state: &SessionState) -> Result<(), SessionError>;
}

pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> FileSessionStore {
        FileSessionStore { dir: dir.into() }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<SessionState, SessionError> {
        let path = self.path();

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No session file at {}", path.display());
                return Ok(SessionState::default());
            }
            Err(source) => return Err(SessionError::Io { path, source }),
        };

        serde_json::from_str(&contents).map_err(|source| SessionError::Corrupted { path, source })
    }

    async fn save(&self, state: &SessionState) -> Result<(), SessionError> {
        let path = self.path();

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SessionError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let contents = serde_json::to_string_pretty(state)
            .map_err(|source| SessionError::Corrupted {
                path: path.clone(),
                source,
            })?;

        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| SessionError::Io { path, source })
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    state: Mutex<SessionState>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<SessionState, SessionError> {
        Ok(self.state.lock().clone())
    }

    async fn save(&self, state: &SessionState) -> Result<(), SessionError> {
        *self.state.lock() = state.clone();
        Ok(())
    }
}
