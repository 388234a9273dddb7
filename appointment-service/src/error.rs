use crate::models::AppointmentStatus;
use center_service::CenterError;
use error_common::{codes, Categorized, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("{0}")]
    Validation(String),

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Failed to upload report: {0}")]
    Upload(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppointmentError {
    pub(crate) fn not_found() -> Self {
        Self::NotFound("Appointment not found".into())
    }

    pub(crate) fn concurrent_update() -> Self {
        Self::Conflict("Appointment was changed by another request, please retry".into())
    }
}

impl Categorized for AppointmentError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidTransition { .. } => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Upload(_) => ErrorKind::Upload,
            Self::Storage(_) => ErrorKind::Unknown,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => codes::validation::INVALID_TRANSITION,
            other => other.kind().default_code(),
        }
    }
}

impl From<CenterError> for AppointmentError {
    fn from(err: CenterError) -> Self {
        match err {
            CenterError::Validation(msg) | CenterError::Conflict(msg) => Self::Validation(msg),
            CenterError::NotFound(msg) => Self::NotFound(msg),
            CenterError::Forbidden(msg) => Self::Forbidden(msg),
            CenterError::Storage(msg) => Self::Storage(msg),
        }
    }
}

impl From<auth_identity::IdentityError> for AppointmentError {
    fn from(err: auth_identity::IdentityError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<sqlx::Error> for AppointmentError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type AppointmentResult<T> = Result<T, AppointmentError>;
