use thiserror::Error;

/// All errors produced by the status monitor core and its callers.
#[derive(Error, Debug)]
pub enum StatusError {
    /// The persisted monitor store failed.
    #[error("Storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An administrative command carried malformed monitor input.
    #[error("Invalid monitor: {0}")]
    InvalidMonitor(String),

    /// No monitor exists with the given id.
    #[error("Unknown monitor: {0}")]
    UnknownMonitor(String),

    /// A status value string is not one of the recognised statuses.
    #[error("Invalid monitor status: {0}")]
    InvalidStatus(String),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the status monitor crates.
pub type Result<T> = std::result::Result<T, StatusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_storage() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = StatusError::Storage(Box::new(io_err));
        let msg = err.to_string();
        assert!(msg.contains("Storage error"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_invalid_monitor() {
        let err = StatusError::InvalidMonitor("query port must not be 0".to_string());
        assert_eq!(err.to_string(), "Invalid monitor: query port must not be 0");
    }

    #[test]
    fn test_error_display_unknown_monitor() {
        let err = StatusError::UnknownMonitor("abc".to_string());
        assert_eq!(err.to_string(), "Unknown monitor: abc");
    }

    #[test]
    fn test_error_from_anyhow() {
        let err: StatusError = anyhow::anyhow!("scheduler task panicked").into();
        assert_eq!(err.to_string(), "scheduler task panicked");
    }

    #[test]
    fn test_error_display_invalid_status() {
        let err = StatusError::InvalidStatus("PAUSED".to_string());
        assert_eq!(err.to_string(), "Invalid monitor status: PAUSED");
    }
}
