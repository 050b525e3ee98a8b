//! Error types for Searsia.
//!
//! The cache core produces a single error of its own (a resource that could not
//! answer); the remaining variants belong to the statistics export and configuration.

use thiserror::Error;

/// Result type alias using `SearsiaError`.
pub type Result<T> = std::result::Result<T, SearsiaError>;

/// Main error type for all Searsia operations.
#[derive(Debug, Error)]
pub enum SearsiaError {
    // ═══════════════════════════════════════════════════════════════════════════
    // RESOURCE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The resource's search capability failed.
    #[error("Resource @{resource} unavailable: {reason}")]
    ResourceUnavailable {
        /// Identity of the failing resource
        resource: String,
        /// What went wrong
        reason: String,
    },

    /// A resource identity that cannot be used as a statistics file name.
    #[error("Invalid resource identifier: {0:?}")]
    InvalidResourceId(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SearsiaError {
    /// Shorthand for [`SearsiaError::ResourceUnavailable`].
    pub fn unavailable(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        SearsiaError::ResourceUnavailable {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error is recoverable (a later call may succeed).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SearsiaError::ResourceUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SearsiaError::unavailable("wiki", "connection refused");
        assert_eq!(err.to_string(), "Resource @wiki unavailable: connection refused");
    }

    #[test]
    fn test_error_classification() {
        assert!(SearsiaError::unavailable("wiki", "timeout").is_recoverable());
        assert!(!SearsiaError::ConfigError("bad".into()).is_recoverable());
        assert!(!SearsiaError::InvalidResourceId("../x".into()).is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SearsiaError = io.into();
        assert!(matches!(err, SearsiaError::IoError(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: SearsiaError = json.into();
        assert!(matches!(err, SearsiaError::JsonError(_)));
        assert!(!err.is_recoverable());
    }
}
