//! Cover database operations

use calliope_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{books, guid};

/// Cover image record; the bytes live in upload storage under `id`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cover {
    pub id: Uuid,
    pub filename: String,
    pub book_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Cover {
    pub fn new(filename: impl Into<String>, book_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            book_id,
            created_at: Utc::now(),
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: guid(row, "guid")?,
            filename: row.try_get("filename")?,
            book_id: guid(row, "book_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

pub async fn insert(conn: &mut SqliteConnection, cover: &Cover) -> Result<()> {
    sqlx::query("INSERT INTO covers (guid, filename, book_id, created_at) VALUES (?, ?, ?, ?)")
        .bind(cover.id.to_string())
        .bind(&cover.filename)
        .bind(cover.book_id.to_string())
        .bind(cover.created_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::on_missing_reference(e, format!("Book {}", cover.book_id)))?;
    Ok(())
}

pub async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<Cover> {
    let row = sqlx::query("SELECT guid, filename, book_id, created_at FROM covers WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Cover {}", id)))?;

    Cover::from_row(&row)
}

pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM covers WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Make `cover` the book's current cover
///
/// Returns the id of the cover it replaced, whose row is deleted. The insert
/// comes first so a transaction takes the write lock before reading.
pub async fn replace(conn: &mut SqliteConnection, cover: &Cover) -> Result<Option<Uuid>> {
    insert(conn, cover).await?;

    let mut book = books::load(conn, cover.book_id).await?;
    let previous = book.cover_id;
    book.cover_id = Some(cover.id);
    books::save_links(conn, &mut book).await?;

    if let Some(old) = previous {
        delete(conn, old).await?;
    }
    Ok(previous)
}
