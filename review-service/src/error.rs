use appointment_service::AppointmentError;
use center_service::CenterError;
use database_layer::DatabaseError;
use error_common::{Categorized, ErrorKind};
use thiserror::Error;

const DUPLICATE_REVIEW: &str = "You have already reviewed this appointment";

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ReviewError {
    pub(crate) fn duplicate() -> Self {
        Self::Conflict(DUPLICATE_REVIEW.into())
    }

    pub(crate) fn not_found() -> Self {
        Self::NotFound("Review not found".into())
    }
}

impl Categorized for ReviewError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Unknown,
        }
    }
}

impl From<sqlx::Error> for ReviewError {
    fn from(err: sqlx::Error) -> Self {
        if database_layer::is_unique_violation(&err) {
            return Self::duplicate();
        }
        Self::Storage(err.to_string())
    }
}

impl From<DatabaseError> for ReviewError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UniqueViolation(_) => Self::duplicate(),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<CenterError> for ReviewError {
    fn from(err: CenterError) -> Self {
        match err {
            CenterError::Validation(msg) => Self::Validation(msg),
            CenterError::NotFound(msg) => Self::NotFound(msg),
            CenterError::Forbidden(msg) => Self::Forbidden(msg),
            CenterError::Conflict(msg) => Self::Conflict(msg),
            CenterError::Storage(msg) => Self::Storage(msg),
        }
    }
}

impl From<AppointmentError> for ReviewError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(msg) => Self::NotFound(msg),
            AppointmentError::Forbidden(msg) => Self::Forbidden(msg),
            AppointmentError::Validation(msg) => Self::Validation(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<auth_identity::IdentityError> for ReviewError {
    fn from(err: auth_identity::IdentityError) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type ReviewResult<T> = Result<T, ReviewError>;
