use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Clone, Debug, Error)]
pub enum ApiError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Request failed ({status}): {message}")]
    Http {
        status: u16,
        message: String,
        /// Decoded JSON error body, when the server sent one.
        payload: Option<Value>,
    },
    #[error("Response error: {0}")]
    Parse(String),
    #[error("Request error: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Builds an HTTP error from a non-success status and its raw body.
    #[must_use]
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let payload = serde_json::from_slice::<Value>(body).ok();
        Self::Http {
            status: status.as_u16(),
            message: sanitize_body(&String::from_utf8_lossy(body)),
            payload,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }

    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Http { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }
}

/// Maps transport failures into timeout or network errors.
pub(crate) fn map_request_error(err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout("Request timed out. Please try again.".to_string())
    } else {
        ApiError::Network(format!("Unable to reach the server: {err}"))
    }
}

/// Trims and truncates error bodies before they reach a user-facing message.
fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
