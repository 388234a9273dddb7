use error_common::{codes, Categorized, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("{0}")]
    Validation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("User already exists with this email")]
    UserAlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid credentials or account not verified")]
    AccountNotVerified,

    #[error("Invalid OTP type")]
    OtpPurposeMismatch,

    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Hashing error")]
    HashingError,

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl Categorized for IdentityError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::OtpPurposeMismatch | Self::InvalidOtp => {
                ErrorKind::Validation
            }
            Self::UserNotFound => ErrorKind::NotFound,
            Self::UserAlreadyExists => ErrorKind::Conflict,
            Self::InvalidCredentials | Self::AccountNotVerified | Self::InvalidToken => {
                ErrorKind::Authentication
            }
            Self::HashingError | Self::JwtError(_) | Self::Storage(_) => ErrorKind::Unknown,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::OtpPurposeMismatch | Self::InvalidOtp => codes::validation::INVALID_OTP,
            Self::InvalidToken => codes::authentication::TOKEN_INVALID,
            other => other.kind().default_code(),
        }
    }
}

impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        if database_layer::is_unique_violation(&err) {
            Self::UserAlreadyExists
        } else {
            Self::Storage(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, IdentityError>;
