//! Errors from chat-completion calls.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    /// The model endpoint answered with a non-success status.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Credentials were rejected (HTTP 401/403).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// HTTP 429.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The response did not have the chat-completion shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_rate_limited() {
        let err = LlmError::RateLimited("slow down".into());
        assert_eq!(err.to_string(), "rate limited: slow down");
    }

    #[test]
    fn display_invalid_response() {
        let err = LlmError::InvalidResponse("no choices".into());
        assert_eq!(err.to_string(), "invalid response: no choices");
    }

    #[test]
    fn from_serde_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: LlmError = json_err.into();
        assert!(matches!(err, LlmError::Json(_)));
    }
}
