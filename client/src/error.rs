//! Client error types.
//!
//! DESIGN
//! ======
//! Error frames arrive with a grepable code, a human message, and optional
//! per-field validation details. The user-facing message is computed ONCE,
//! here, when the frame is parsed — callers never dig through payload shapes
//! at the rendering site.

use frames::Data;

/// A structured failure reported by the server.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{user_message}")]
pub struct RemoteError {
    /// Grepable error code (e.g. `E_UNPROCESSABLE`), if the server sent one.
    pub code: Option<String>,
    /// The one message worth showing a person. First validation detail if
    /// present, else the top-level message.
    pub user_message: String,
    pub retryable: bool,
}

impl RemoteError {
    /// Parse an error frame's payload.
    #[must_use]
    pub fn from_error_data(data: &Data) -> Self {
        let detail = data
            .get(frames::FRAME_DETAILS)
            .and_then(|v| v.as_array())
            .and_then(|details| details.first())
            .and_then(|v| v.as_str());
        let message = data.get(frames::FRAME_MESSAGE).and_then(|v| v.as_str());

        Self {
            code: data
                .get(frames::FRAME_CODE)
                .and_then(|v| v.as_str())
                .map(str::to_string),
            user_message: detail.or(message).unwrap_or("unknown error").to_string(),
            retryable: data
                .get(frames::FRAME_RETRYABLE)
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
        }
    }

    /// Whether the server reported the requested user as missing.
    #[must_use]
    pub fn is_user_not_found(&self) -> bool {
        self.code.as_deref() == Some("E_USER_NOT_FOUND")
    }
}

/// Any failure a remote call can produce.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("connection closed")]
    Closed,
    #[error("malformed server payload: {0}")]
    Protocol(String),
    #[error("no active user")]
    NoUser,
}

impl ClientError {
    /// The one message worth showing a person.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Remote(e) => e.user_message.clone(),
            other => other.to_string(),
        }
    }
}
