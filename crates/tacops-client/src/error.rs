use tacops_core::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid backend url: {0}")]
    Url(String),
    #[error("backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{endpoint} request failed with status {status}")]
    Status {
        endpoint: &'static str,
        status: u16,
        detail: Option<String>,
    },
    #[error("could not decode {endpoint} response: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Url(_) => ErrorCode::InvalidInput,
            Self::Transport(_) => ErrorCode::Unavailable,
            Self::Status { status: 404, .. } => ErrorCode::NotFound,
            Self::Status { status: 400 | 422, .. } => ErrorCode::InvalidInput,
            Self::Status { .. } => ErrorCode::Upstream,
            Self::Decode { .. } => ErrorCode::Parse,
        }
    }

    /// Error detail reported by the backend, if it sent one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status {
                detail: Some(detail),
                ..
            } => Some(detail),
            _ => None,
        }
    }

    /// Text shown to the operator: the backend's detail, then the transport
    /// error, then `fallback`.
    pub fn detail_or(&self, fallback: &str) -> String {
        match self {
            Self::Status {
                detail: Some(detail),
                ..
            } => detail.clone(),
            Self::Transport(err) => err.to_string(),
            _ => fallback.to_string(),
        }
    }
}

/// Pulls `detail` out of a FastAPI-style error body.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) if !detail.is_empty() => Some(detail.clone()),
        serde_json::Value::Null | serde_json::Value::String(_) => None,
        other => Some(other.to_string()),
    }
}
