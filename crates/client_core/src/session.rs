//! Access token and user record, persisted between runs.

use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use shared::protocol::User;
use tracing::warn;

use crate::error::ClientError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    pub fn clear(&mut self) {
        self.token = None;
        self.user = None;
    }
}

/// JSON file holding the last [`Session`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// A missing file is an empty session; an unreadable one is logged and
    /// treated the same way.
    pub fn load(&self) -> Session {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Session::default(),
            Err(err) => {
                warn!(path = %self.path.display(), "failed to read session file: {err}");
                return Session::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(err) => {
                warn!(path = %self.path.display(), "failed to parse session file: {err}");
                Session::default()
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), ClientError> {
        if session.token.is_none() {
            return self.clear();
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                ClientError::Session(format!(
                    "failed to create '{}': {err}",
                    parent.display()
                ))
            })?;
        }
        let body = serde_json::to_vec_pretty(session)
            .map_err(|err| ClientError::Session(err.to_string()))?;
        fs::write(&self.path, body).map_err(|err| {
            ClientError::Session(format!("failed to write '{}': {err}", self.path.display()))
        })
    }

    pub fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ClientError::Session(format!(
                "failed to remove '{}': {err}",
                self.path.display()
            ))),
        }
    }
}
