//! Translation error types

use thiserror::Error;

/// Errors raised inside the translation engine.
///
/// None of these reach callers of `Translator::translate`; they surface from
/// the chat client, the AI delegate and the overlay loader, and are recovered
/// by falling back to heuristics or an empty overlay.
#[derive(Error, Debug)]
pub enum NlpError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Chat endpoint returned an error response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded. Retry after {retry_after:?} seconds")]
    RateLimit { retry_after: Option<u64> },

    #[error("Server error: {0}")]
    Server(String),

    /// Completion carried no usable text
    #[error("Empty completion: {0}")]
    EmptyResponse(String),

    /// Completion text did not look like a query
    #[error("Rejected completion: {0}")]
    RejectedOutput(String),

    #[error("Overlay error: {0}")]
    Overlay(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NlpError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }

    pub fn empty_response(msg: impl Into<String>) -> Self {
        Self::EmptyResponse(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::RejectedOutput(msg.into())
    }

    pub fn overlay(msg: impl Into<String>) -> Self {
        Self::Overlay(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } | Self::Server(_) => true,
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Auth(_) => Some(401),
            Self::RateLimit { .. } => Some(429),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type for translation internals
pub type Result<T> = std::result::Result<T, NlpError>;

impl From<NlpError> for loglens_core::AppError {
    fn from(err: NlpError) -> Self {
        match err {
            NlpError::Config(msg) => loglens_core::AppError::config(msg),
            NlpError::Url(err) => loglens_core::AppError::config(err.to_string()),
            NlpError::Overlay(msg) => loglens_core::AppError::validation(msg),
            other => loglens_core::AppError::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(NlpError::RateLimit { retry_after: Some(3) }.is_retryable());
        assert!(NlpError::server("bad gateway").is_retryable());
        assert!(!NlpError::auth("no key").is_retryable());
        assert!(!NlpError::rejected("prose").is_retryable());
    }

    #[test]
    fn test_status_code() {
        assert_eq!(NlpError::api(400, "bad").status_code(), Some(400));
        assert_eq!(NlpError::auth("x").status_code(), Some(401));
        assert_eq!(NlpError::empty_response("x").status_code(), None);
    }

    #[test]
    fn test_into_app_error() {
        let err: loglens_core::AppError = NlpError::config("missing endpoint").into();
        assert!(matches!(err, loglens_core::AppError::Config(_)));
    }
}
