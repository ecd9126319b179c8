//! Error types for the Hanna Cloud client
//!
//! Every failure in the crate is a [`HannaError`]. The poll coordinator only
//! cares about the coarse [`ErrorKind`] taxonomy: authentication problems need
//! the user, network and API problems are retried on the next cycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Hanna Cloud operations
pub type Result<T> = std::result::Result<T, HannaError>;

/// Comprehensive error types for Hanna Cloud operations
#[derive(Error, Debug)]
pub enum HannaError {
    /// Bad credentials or a token the server rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Connectivity problems
    #[error("Network error: {0}")]
    Network(String),

    /// Malformed or error responses from the vendor API
    #[error("API error: {0}")]
    Api(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential errors
    #[error("Credential error: {0}")]
    Credentials(String),

    /// Cryptographic errors
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error taxonomy used by the poll coordinator and the host boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// User-actionable: credentials must be re-entered
    Auth,
    /// Transient connectivity or timeout
    Network,
    /// Unexpected server response
    Api,
    /// Local misconfiguration
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Network => "network",
            ErrorKind::Api => "api",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

impl HannaError {
    /// Create an authentication error
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Create an API error
    pub fn api<S: Into<String>>(msg: S) -> Self {
        Self::Api(msg.into())
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a credentials error
    pub fn credentials<S: Into<String>>(msg: S) -> Self {
        Self::Credentials(msg.into())
    }

    /// Create a crypto error
    pub fn crypto<S: Into<String>>(msg: S) -> Self {
        Self::Crypto(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Classify the error into the coordinator taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            HannaError::Authentication(_) | HannaError::Credentials(_) | HannaError::Crypto(_) => {
                ErrorKind::Auth
            }
            HannaError::Network(_) | HannaError::Timeout(_) | HannaError::Io(_) => {
                ErrorKind::Network
            }
            HannaError::Http(e) => {
                if e.is_decode() || e.is_body() {
                    ErrorKind::Api
                } else {
                    ErrorKind::Network
                }
            }
            HannaError::Api(_) | HannaError::Json(_) => ErrorKind::Api,
            HannaError::Config(_) | HannaError::InvalidInput(_) => ErrorKind::Config,
        }
    }

    /// Check if error is retried automatically on the next cycle
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Api)
    }

    /// Check if error indicates authentication issue
    pub fn is_auth_error(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }
}

/// Map a `reqwest` transport failure onto the taxonomy with a readable message
pub(crate) fn transport_error(operation: &str, err: reqwest::Error) -> HannaError {
    if err.is_timeout() {
        HannaError::timeout(format!("{operation} timed out: {err}"))
    } else if err.is_connect() {
        HannaError::network(format!("{operation} could not connect: {err}"))
    } else if err.is_decode() {
        HannaError::api(format!("{operation} returned an undecodable body: {err}"))
    } else {
        HannaError::Http(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(HannaError::authentication("bad").kind(), ErrorKind::Auth);
        assert_eq!(HannaError::credentials("empty").kind(), ErrorKind::Auth);
        assert_eq!(HannaError::network("down").kind(), ErrorKind::Network);
        assert_eq!(HannaError::timeout("slow").kind(), ErrorKind::Network);
        assert_eq!(HannaError::api("weird").kind(), ErrorKind::Api);
        assert_eq!(HannaError::config("nope").kind(), ErrorKind::Config);

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(HannaError::from(json_err).kind(), ErrorKind::Api);
    }

    #[test]
    fn test_retryable_and_auth_flags() {
        assert!(HannaError::network("down").is_retryable());
        assert!(HannaError::api("weird").is_retryable());
        assert!(!HannaError::authentication("bad").is_retryable());
        assert!(HannaError::authentication("bad").is_auth_error());
        assert!(!HannaError::config("nope").is_retryable());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::Auth.to_string(), "auth");
        assert_eq!(ErrorKind::Network.to_string(), "network");
    }
}
