use error_common::{Categorized, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CenterError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl Categorized for CenterError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Storage(_) => ErrorKind::Unknown,
        }
    }
}

impl From<sqlx::Error> for CenterError {
    fn from(err: sqlx::Error) -> Self {
        match database_layer::unique_violation_constraint(&err) {
            Some(constraint) if constraint == "diagnostic_tests_active_name_key" => {
                Self::Conflict("A test with this name already exists in this center".into())
            }
            Some(_) => Self::Conflict("This diagnostic center already exists".into()),
            None => Self::Storage(err.to_string()),
        }
    }
}

impl From<auth_identity::IdentityError> for CenterError {
    fn from(err: auth_identity::IdentityError) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type CenterResult<T> = Result<T, CenterError>;
