use thiserror::Error;

/// Error type for dbrs operations
#[derive(Debug, Error)]
pub enum DbRsError {
    /// The underlying client capability is not present in this build or
    /// environment. Raised before any use of the backend.
    #[error("client capability `{0}` is unavailable")]
    CapabilityMissing(&'static str),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Operation requires an open connection.
    #[error("not connected")]
    NotConnected,
}

/// Result type alias for dbrs operations
pub type Result<T> = std::result::Result<T, DbRsError>;

/// Last-error snapshot retrievable through [`crate::Driver::report_error`].
///
/// Produced per failed operation; the driver keeps only the most recent one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorRecord {
    pub message: String,
    pub code: String,
}

impl ErrorRecord {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
        }
    }
}
