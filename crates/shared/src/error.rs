use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
    Unknown,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 409 | 422 => Self::Validation,
            429 => Self::RateLimited,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

/// Error body returned by the API: `{"detail": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: serde_json::Value,
}

/// Non-2xx response reduced to a code and a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: u16,
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            code: ErrorCode::from_status(status),
            message: message.into(),
        }
    }

    /// Message precedence: a string `detail` field, then any non-empty text
    /// body, then `HTTP <status>: <reason>`.
    pub fn from_response(status: u16, reason: &str, body: &str) -> Self {
        let trimmed = body.trim();
        let from_json = serde_json::from_str::<ErrorDetail>(trimmed)
            .ok()
            .and_then(|parsed| parsed.detail.as_str().map(str::to_string));
        let looks_like_json = trimmed.starts_with('{') || trimmed.starts_with('[');

        let message = match from_json {
            Some(detail) => detail,
            None if !trimmed.is_empty() && !looks_like_json => trimmed.to_string(),
            None => format!("HTTP {status}: {reason}"),
        };
        Self::new(status, message)
    }
}
