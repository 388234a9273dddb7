use error_common::{Categorized, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Invalid email configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Failed to send email: {0}")]
    SendFailed(String),
}

impl Categorized for EmailError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Unknown
    }
}

pub type EmailResult<T> = Result<T, EmailError>;
