//! Common error types for Calliope

use thiserror::Error;

/// Common result type for Calliope operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the catalogue service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Natural key or unique column already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or rejected credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to touch the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map a write error, reporting UNIQUE violations as [`Error::Conflict`]
    pub fn on_unique(err: sqlx::Error, message: impl Into<String>) -> Self {
        if is_unique_violation(&err) {
            Error::Conflict(message.into())
        } else {
            Error::Database(err)
        }
    }

    /// Map a delete error, reporting FOREIGN KEY violations as [`Error::Conflict`]
    pub fn on_foreign_key(err: sqlx::Error, message: impl Into<String>) -> Self {
        if is_foreign_key_violation(&err) {
            Error::Conflict(message.into())
        } else {
            Error::Database(err)
        }
    }

    /// Map an insert error, reporting a missing referenced row as [`Error::NotFound`]
    pub fn on_missing_reference(err: sqlx::Error, message: impl Into<String>) -> Self {
        if is_foreign_key_violation(&err) {
            Error::NotFound(message.into())
        } else {
            Error::Database(err)
        }
    }
}

/// True when the database rejected a write because of a UNIQUE constraint
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// SQLITE_CONSTRAINT_TRIGGER, raised for `ON DELETE RESTRICT` actions
const SQLITE_CONSTRAINT_TRIGGER: &str = "1811";

/// True when the database rejected a write because of a FOREIGN KEY constraint
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_foreign_key_violation()
                || (db.code().as_deref() == Some(SQLITE_CONSTRAINT_TRIGGER)
                    && db.message().contains("FOREIGN KEY"))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_unique_errors_stay_database_errors() {
        let err = Error::on_unique(sqlx::Error::RowNotFound, "duplicate");
        assert!(matches!(err, Error::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::NotFound("author 42".to_string()).to_string(),
            "Not found: author 42"
        );
        assert_eq!(
            Error::InvalidInput("nbPage".to_string()).to_string(),
            "Invalid input: nbPage"
        );
    }
}
