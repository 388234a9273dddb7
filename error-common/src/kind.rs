use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codes;

/// Coarse error category shared by every DiagnoCare crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Forbidden,
    NotFound,
    Conflict,
    Upload,
    Unknown,
}

impl ErrorKind {
    /// HTTP status code for this kind.
    ///
    /// Conflicts surface as 400, matching the booking API's established
    /// contract for duplicate reviews and test names.
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            Self::Validation | Self::Conflict => 400,
            Self::Authentication => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Upload | Self::Unknown => 500,
        }
    }

    /// Machine readable error type used in the `error` field of responses
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Authentication => "authentication_error",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Upload => "upload_error",
            Self::Unknown => "unknown_error",
        }
    }

    /// Default error code for this kind
    #[must_use]
    pub fn default_code(self) -> &'static str {
        match self {
            Self::Validation => codes::validation::INVALID_INPUT,
            Self::Authentication => codes::authentication::INVALID_CREDENTIALS,
            Self::Forbidden => codes::authorization::ACCESS_DENIED,
            Self::NotFound => codes::resource::NOT_FOUND,
            Self::Conflict => codes::resource::CONFLICT,
            Self::Upload => codes::storage::UPLOAD_FAILED,
            Self::Unknown => codes::system::INTERNAL,
        }
    }

    /// Whether the caller-facing message is safe to echo verbatim
    #[must_use]
    pub fn is_client_error(self) -> bool {
        self.status_code() < 500
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every domain error so the transport layer can map it
pub trait Categorized {
    fn kind(&self) -> ErrorKind;

    /// Specific error code; defaults to the kind's code
    fn code(&self) -> &'static str {
        self.kind().default_code()
    }
}
