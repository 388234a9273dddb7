use thiserror::Error;

use crate::{Categorized, ErrorKind};

/// Infrastructure errors raised while assembling and running the service
#[derive(Error, Debug)]
pub enum DiagnoCareError {
    /// Server configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Database connection or migration errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// External service errors (SMTP, object storage)
    #[error("External service error: {0}")]
    ExternalError(String),

    /// Server startup and I/O errors
    #[error("Server error: {0}")]
    ServerError(String),

    /// Wrapped external errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Categorized for DiagnoCareError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Unknown
    }

    fn code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => crate::codes::system::CONFIGURATION,
            Self::DatabaseError(_) => crate::codes::database::CONNECTION_FAILED,
            _ => crate::codes::system::INTERNAL,
        }
    }
}

/// Result type alias for DiagnoCare infrastructure operations
pub type Result<T> = std::result::Result<T, DiagnoCareError>;

/// Log an infrastructure error with its context
pub fn log_error(context: &str, error: &DiagnoCareError) {
    tracing::error!(
        context = context,
        error = %error,
        code = error.code(),
        "DiagnoCare error occurred"
    );
}
