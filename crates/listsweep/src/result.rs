//! Result and error types for listsweep.

use thiserror::Error;

/// Result type for listsweep operations
pub type SweepResult<T> = Result<T, SweepError>;

/// Errors that can occur while driving a list page
#[derive(Debug, Error)]
pub enum SweepError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Connection to a running browser failed
    #[error("Failed to connect to browser: {message}")]
    ConnectionFailed {
        /// Error message
        message: String,
    },

    /// Page error
    #[error("Page error: {message}")]
    PageError {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Script evaluation inside the page failed
    #[error("Script evaluation failed: {message}")]
    ScriptError {
        /// Error message
        message: String,
    },

    /// The element behind a handle is no longer attached to the page
    #[error("Element {reference} is no longer attached")]
    StaleElement {
        /// Opaque element reference
        reference: String,
    },

    /// A control rejected direct or synthetic activation
    #[error("Activation rejected: {message}")]
    ActivationRejected {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Key-value store error
    #[error("Storage error: {message}")]
    Storage {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl SweepError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::PageError {
            message: message.into(),
        }
    }

    /// Create a script error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    /// Create an activation error
    #[must_use]
    pub fn activation(message: impl Into<String>) -> Self {
        Self::ActivationRejected {
            message: message.into(),
        }
    }

    /// Create a storage error
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Whether the error means the element went away underneath us
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleElement { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_error_message() {
        let err = SweepError::activation("click intercepted");
        assert!(err.to_string().contains("Activation rejected"));
        assert!(err.to_string().contains("click intercepted"));
    }

    #[test]
    fn test_stale_detection() {
        let err = SweepError::StaleElement {
            reference: "17".to_string(),
        };
        assert!(err.is_stale());
        assert!(!SweepError::page("boom").is_stale());
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SweepError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}
