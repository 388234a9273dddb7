use error_common::{codes, Categorized, ErrorKind};
use thiserror::Error;

/// PostgreSQL SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Database error: {0}")]
    SqlxError(sqlx::Error),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match unique_violation_constraint(&err) {
            Some(constraint) => Self::UniqueViolation(constraint),
            None => Self::SqlxError(err),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::MigrationError(err.to_string())
    }
}

impl Categorized for DatabaseError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::UniqueViolation(_) => ErrorKind::Conflict,
            _ => ErrorKind::Unknown,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => codes::database::CONNECTION_FAILED,
            Self::UniqueViolation(_) => codes::database::CONSTRAINT_VIOLATION,
            _ => codes::database::QUERY_FAILED,
        }
    }
}

/// Returns the violated constraint name when `err` is a unique violation
#[must_use]
pub fn unique_violation_constraint(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            Some(db.constraint().unwrap_or("unknown").to_string())
        }
        _ => None,
    }
}

#[must_use]
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    unique_violation_constraint(err).is_some()
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
