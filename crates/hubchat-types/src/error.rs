//! Error hierarchy for the hub chat client.

use thiserror::Error;

/// Errors surfaced by a chat stream session.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Non-success HTTP status. `message` comes from the body's `error` field
    /// or falls back to `HTTP <status>`.
    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Response body is null")]
    MissingBody,

    /// Payload of an SSE `error` event.
    #[error("{0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid request: {0}")]
    Request(String),

    #[error("Stream processing exceeded maximum iterations ({limit})")]
    IterationLimit { limit: u64 },

    /// Abort-kind error. Sessions stop quietly on it and never report it.
    #[error("Stream cancelled")]
    Cancelled,
}

impl ChatError {
    /// Returns `true` for the abort kind, which is not an error from the
    /// caller's point of view.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChatError::Cancelled)
    }
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_displays_message_only() {
        let err = ChatError::Http {
            status: 400,
            message: "bad request".into(),
        };
        assert_eq!(err.to_string(), "bad request");
    }

    #[test]
    fn iteration_limit_message() {
        let err = ChatError::IterationLimit { limit: 10 };
        assert!(err.to_string().contains("exceeded maximum iterations"));
    }

    #[test]
    fn only_cancelled_is_abort_kind() {
        assert!(ChatError::Cancelled.is_cancelled());
        assert!(!ChatError::Timeout.is_cancelled());
        assert!(!ChatError::Network("reset".into()).is_cancelled());
    }
}
