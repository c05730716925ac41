//! Error types for jskos-proxy.

use thiserror::Error;

/// Result type alias using jskos-proxy's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for jskos-proxy operations.
///
/// Absence of a scheme or concept is not an error: lookups return
/// `Ok(None)` and the outer layer maps that to 404. [`Error::Upstream`]
/// is the failure an outer layer maps to a 5xx.
#[derive(Error, Debug)]
pub enum Error {
    /// An upstream registry call failed (transport, non-2xx, timeout, bad payload)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Every configured registry failed during a refresh cycle
    #[error("Refresh failed: {0}")]
    RefreshFailed(String),

    /// Requested serialization format is not supported
    #[error("Serialization format {0} not supported!")]
    InvalidFormat(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error came from an upstream registry.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::Upstream(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Upstream(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_upstream() {
        let err = Error::Upstream("connection refused".to_string());
        assert_eq!(err.to_string(), "Upstream error: connection refused");
    }

    #[test]
    fn test_error_display_invalid_format() {
        let err = Error::InvalidFormat("foo".to_string());
        assert_eq!(err.to_string(), "Serialization format foo not supported!");
    }

    #[test]
    fn test_error_display_refresh_failed() {
        let err = Error::RefreshFailed("2 registries failed".to_string());
        assert_eq!(err.to_string(), "Refresh failed: 2 registries failed");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("no backend configured".to_string());
        assert_eq!(err.to_string(), "Configuration error: no backend configured");
    }

    #[test]
    fn test_is_upstream() {
        assert!(Error::Upstream("x".into()).is_upstream());
        assert!(!Error::InvalidInput("x".into()).is_upstream());
        assert!(!Error::RefreshFailed("x".into()).is_upstream());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>(r#"{"invalid": json}"#);
        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
