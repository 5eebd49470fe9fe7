//! Repositories for calliope-api
//!
//! One module per table. Functions take `&mut SqliteConnection` so the same
//! code runs on a pooled connection or inside a transaction.

pub mod authors;
pub mod avatars;
pub mod books;
pub mod comments;
pub mod covers;
pub mod formats;
pub mod genres;
pub mod payments;
pub mod publishers;
pub mod publishings;
pub mod users;

use calliope_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

/// Moderation status shared by books and publishings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Waiting,
    Accepted,
    Refused,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Waiting => "waiting",
            Status::Accepted => "accepted",
            Status::Refused => "refused",
        }
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "waiting" => Ok(Status::Waiting),
            "accepted" => Ok(Status::Accepted),
            "refused" => Ok(Status::Refused),
            other => Err(Error::InvalidInput(format!("Unknown status: {}", other))),
        }
    }
}

/// Read a TEXT guid column
pub(crate) fn guid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw)
        .map_err(|e| Error::Internal(format!("Invalid guid in column {}: {}", column, e)))
}

/// Read a nullable TEXT guid column
pub(crate) fn opt_guid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| {
        Uuid::parse_str(&s)
            .map_err(|e| Error::Internal(format!("Invalid guid in column {}: {}", column, e)))
    })
    .transpose()
}

/// Read a TEXT enum column through its `FromStr`
pub(crate) fn parsed<T: FromStr<Err = Error>>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e: Error| Error::Internal(format!("Bad value in column {}: {}", column, e)))
}

/// Trim a required text field, rejecting blanks
pub(crate) fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Normalise an optional text field: blank becomes `None`
pub(crate) fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
