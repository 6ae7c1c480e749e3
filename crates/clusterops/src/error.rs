use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpsError {
    #[error("transport error: {msg}")]
    Transport { msg: String },

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("unexpected HTTP status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    #[error("cannot compute: {reason}")]
    DegenerateComputation { reason: String },

    #[error("invalid node pattern {pattern:?}: {msg}")]
    InvalidPattern { pattern: String, msg: String },

    #[error("config error: {msg}")]
    Config { msg: String },
}

impl OpsError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        OpsError::MalformedResponse {
            reason: reason.into(),
        }
    }

    pub fn degenerate(reason: impl Into<String>) -> Self {
        OpsError::DegenerateComputation {
            reason: reason.into(),
        }
    }

    /// Raw response body for errors that carry one.
    pub fn body(&self) -> Option<&str> {
        match self {
            OpsError::BadStatus { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for OpsError {
    fn from(e: serde_json::Error) -> Self {
        OpsError::malformed(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OpsError>;
