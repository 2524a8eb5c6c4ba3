/// Unified error handling for the reef client.
///
/// This module provides the error taxonomy used across the whole crate:
/// caller-side precondition failures, connection-state failures, timeouts,
/// server-reported errors, key-absence, and unexpected/protocol errors.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::config::ConfigError;
use crate::resp::RespParseError;

/// Main error type for reef client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-side precondition violation. Never reaches the network.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// No usable channel at call time: closed, not-yet-initialized, or every
    /// pool member down.
    #[error("illegal state: {message}")]
    IllegalState { message: String },

    /// The response did not arrive within the operation deadline.
    #[error("operation timed out: {operation}")]
    Timeout { operation: String },

    /// The server returned a `-`-prefixed error (MOVED/ASK are intercepted
    /// by the cluster router and never surface as this variant).
    #[error("redis error: {message}")]
    RedisError { message: String },

    /// Semantic absence on a GET-family operation (nil bulk reply).
    #[error("key not found")]
    KeyNotFound,

    /// Protocol parse error, malformed integer reply, or any other
    /// condition that should be rare and is always logged.
    #[error("unexpected error: {message}")]
    Unexpected { message: String },

    /// Transport-level I/O failure.
    #[error("network error: {0}")]
    Network(#[from] io::Error),

    /// Configuration load/validation failure.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<RespParseError> for Error {
    fn from(e: RespParseError) -> Self {
        Error::Unexpected {
            message: e.to_string(),
        }
    }
}

/// Result type alias for reef operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn illegal_state<S: Into<String>>(message: S) -> Self {
        Error::IllegalState {
            message: message.into(),
        }
    }

    pub fn timeout<S: Into<String>>(operation: S) -> Self {
        Error::Timeout {
            operation: operation.into(),
        }
    }

    pub fn redis_error<S: Into<String>>(message: S) -> Self {
        Error::RedisError {
            message: message.into(),
        }
    }

    pub fn unexpected<S: Into<String>>(message: S) -> Self {
        Error::Unexpected {
            message: message.into(),
        }
    }

    /// True for errors where a caller retrying the same operation, possibly
    /// against a different node, has a reasonable chance of success.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::IllegalState { .. } | Error::Network(_)
        )
    }

    /// Classification used for logging verbosity only, never for control
    /// flow.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Error::InvalidArgument { .. } => ErrorSeverity::Warning,
            Error::IllegalState { .. } => ErrorSeverity::Error,
            Error::Timeout { .. } => ErrorSeverity::Warning,
            Error::RedisError { .. } => ErrorSeverity::Error,
            Error::KeyNotFound => ErrorSeverity::Info,
            Error::Unexpected { .. } => ErrorSeverity::Critical,
            Error::Network(_) => ErrorSeverity::Warning,
            Error::Config(_) => ErrorSeverity::Critical,
        }
    }

    /// The error-class label used by the observer hook counters (§6).
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidArgument { .. } => ErrorClass::IllegalArgument,
            Error::IllegalState { .. } => ErrorClass::IllegalState,
            Error::Timeout { .. } => ErrorClass::Timeout,
            Error::RedisError { .. } => ErrorClass::RedisError,
            Error::KeyNotFound => ErrorClass::KeyNotFound,
            Error::Unexpected { .. } | Error::Network(_) | Error::Config(_) => {
                ErrorClass::UnexpectedError
            }
        }
    }
}

/// Error severity levels, used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Critical,
    Error,
    Warning,
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Info => write!(f, "INFO"),
        }
    }
}

/// Error-class labels matching the §6 observer hook counter surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    IllegalArgument,
    IllegalState,
    Timeout,
    RedisError,
    KeyNotFound,
    UnexpectedError,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::IllegalArgument => "IllegalArgument",
            ErrorClass::IllegalState => "IllegalState",
            ErrorClass::Timeout => "Timeout",
            ErrorClass::RedisError => "RedisError",
            ErrorClass::KeyNotFound => "KeyNotFound",
            ErrorClass::UnexpectedError => "UnexpectedError",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_creation_and_display() {
        let error = Error::invalid_argument("key must not be empty");
        assert!(matches!(error, Error::InvalidArgument { .. }));
        assert_eq!(error.to_string(), "invalid argument: key must not be empty");
    }

    #[test]
    fn severity_classification() {
        assert_eq!(Error::unexpected("boom").severity(), ErrorSeverity::Critical);
        assert_eq!(Error::timeout("GET").severity(), ErrorSeverity::Warning);
        assert_eq!(Error::KeyNotFound.severity(), ErrorSeverity::Info);
    }

    #[test]
    fn recoverability() {
        assert!(Error::timeout("GET").is_recoverable());
        assert!(!Error::invalid_argument("bad").is_recoverable());
    }

    #[test]
    fn error_class_mapping() {
        assert_eq!(Error::KeyNotFound.class(), ErrorClass::KeyNotFound);
        assert_eq!(
            Error::redis_error("ERR bad").class(),
            ErrorClass::RedisError
        );
    }
}
