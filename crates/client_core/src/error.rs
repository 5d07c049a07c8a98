//! Client error taxonomy.

use shared::{domain::OpportunityId, error::ApiError};
use thiserror::Error;

/// Coarse buckets used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// No response from the API.
    Transport,
    /// 401 while a credential was attached; the session is gone.
    Auth,
    /// Local input rejected before any request was made.
    Validation,
    /// The API answered with a non-2xx status.
    Remote,
    /// Local bookkeeping failure (session file, malformed body).
    Internal,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error while contacting {base_url}: {message}")]
    Transport { base_url: String, message: String },
    #[error("authentication required, please log in again")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Http(#[from] ApiError),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("session store failure: {0}")]
    Session(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Unauthorized => ErrorCategory::Auth,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Http(_) => ErrorCategory::Remote,
            Self::Decode(_) | Self::Session(_) => ErrorCategory::Internal,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.category() == ErrorCategory::Auth
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReorderError {
    #[error("a reorder is already being saved")]
    Busy,
    #[error("opportunity {0} is not in the saved list")]
    UnknownItem(OpportunityId),
    #[error("no drag in progress")]
    NoDrag,
}
