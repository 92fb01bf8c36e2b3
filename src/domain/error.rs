//! Domain-level error types for memory-sync.
//!
//! All errors are typed with `thiserror` and carry enough context to tell
//! the user which input was missing or invalid.

use std::path::PathBuf;
use thiserror::Error;

/// Application-level errors. Every variant is fatal for the run.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Export file unreadable or structurally invalid at the top level.
    #[error("Failed to parse export {}: {message}", path.display())]
    Parse {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A line of the memory artifact does not decode.
    #[error("Invalid memory artifact {} (line {line}): {message}", path.display())]
    Artifact {
        path: PathBuf,
        line: usize,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The remote store rejected or failed a call that the run depends on.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a parse error for the given export path.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a parse error from a JSON decoding failure.
    pub fn json_parse(path: impl Into<PathBuf>, err: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an artifact error for a 1-based line number.
    pub fn artifact(path: impl Into<PathBuf>, line: usize, err: serde_json::Error) -> Self {
        Self::Artifact {
            path: path.into(),
            line,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }
}

/// Failures surfaced by a single call against the remote memory store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network or transport failure, or the server answered 5xx.
    #[error("Remote store unavailable: {message}")]
    Unavailable { message: String },

    /// The call did not complete within the configured timeout.
    #[error("Remote call timed out: {message}")]
    Timeout { message: String },

    /// The token was rejected (401/403).
    #[error("Remote store rejected credentials: {message}")]
    Auth { message: String },

    /// Unexpected status or response body.
    #[error("Unexpected response from remote store: {message}")]
    Protocol { message: String },
}

impl RemoteError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Timeouts count as a kind of unavailability.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_unavailable() {
        assert!(RemoteError::timeout("30s").is_unavailable());
        assert!(RemoteError::unavailable("refused").is_unavailable());
        assert!(!RemoteError::auth("401").is_unavailable());
        assert!(!RemoteError::protocol("bad json").is_unavailable());
    }

    #[test]
    fn test_remote_error_converts_to_app_error() {
        let err: AppError = RemoteError::auth("token expired").into();
        assert!(matches!(err, AppError::Remote(RemoteError::Auth { .. })));
        assert!(err.to_string().contains("token expired"));
    }

    #[test]
    fn test_parse_error_names_path() {
        let err = AppError::parse("/tmp/conversations.json", "expected an array");
        assert_eq!(
            err.to_string(),
            "Failed to parse export /tmp/conversations.json: expected an array"
        );
    }
}
