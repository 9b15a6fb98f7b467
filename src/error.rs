//! Error taxonomy for the chat core.
//!
//! `InvalidMessage` and `UnsupportedModel` are caller/config mistakes and abort
//! the operation. `Completion` failures are expected at the network boundary and
//! the pipeline turns them into fallback text instead of propagating them.

use thiserror::Error;

/// Errors raised by the conversation core.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A message did not have a valid role and content.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// No tokenizer is known for the configured model.
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    /// The remote completion call failed.
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// Failure of a single request to the chat-completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request rejected: {0}")]
    InvalidRequest(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::Authentication(message),
            429 => Self::RateLimited(message),
            400 | 404 | 422 => Self::InvalidRequest(message),
            _ => Self::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            CompletionError::from_status(401, "bad key".into()),
            CompletionError::Authentication(_)
        ));
        assert!(matches!(
            CompletionError::from_status(429, "slow down".into()),
            CompletionError::RateLimited(_)
        ));
        assert!(matches!(
            CompletionError::from_status(400, "context too long".into()),
            CompletionError::InvalidRequest(_)
        ));
        assert_eq!(
            CompletionError::from_status(503, "overloaded".into()),
            CompletionError::Api {
                status: 503,
                message: "overloaded".into()
            }
        );
    }

    #[test]
    fn test_completion_error_wraps() {
        let err: ChatError = CompletionError::RateLimited("quota".into()).into();
        assert_eq!(err.to_string(), "rate limited: quota");
    }
}
