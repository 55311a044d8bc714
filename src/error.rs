//! Error types shared by the client, session, upload and analysis layers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskError {
    /// Required service credentials are missing; nothing was sent.
    #[error("{0}")]
    Config(String),

    /// The remote answered with a non-2xx status.
    #[error("{}", http_message(.status, .body))]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{0}")]
    Parse(String),

    /// Rejected client-side before any call.
    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type DeskResult<T> = Result<T, DeskError>;

fn http_message(status: &u16, body: &str) -> String {
    if !body.trim().is_empty() {
        return body.to_string();
    }
    reqwest::StatusCode::from_u16(*status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

impl DeskError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Transport failures and server-side errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for DeskError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for DeskError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
