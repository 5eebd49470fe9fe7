//! Publishing database operations
//!
//! A publishing is one edition of a book: editor label, ISBN, page count,
//! and the format it was printed in. Every ingested book gets a fresh one.

use calliope_common::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::formats::Format;
use super::{guid, parsed, Status};
use crate::services::record_factory::NewPublishing;

/// Publishing record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Publishing {
    pub id: Uuid,
    pub label: String,
    pub language: String,
    pub isbn: String,
    pub nb_pages: i64,
    pub publication_date: NaiveDate,
    pub status: Status,
    pub book_id: Uuid,
    pub format_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Publishing {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: guid(row, "guid")?,
            label: row.try_get("label")?,
            language: row.try_get("language")?,
            isbn: row.try_get("isbn")?,
            nb_pages: row.try_get("nb_pages")?,
            publication_date: row.try_get("publication_date")?,
            status: parsed(row, "status")?,
            book_id: guid(row, "book_id")?,
            format_id: guid(row, "format_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Publishing together with its format
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishingDetail {
    #[serde(flatten)]
    pub publishing: Publishing,
    pub format: Format,
}

const SELECT_DETAIL: &str = r#"
    SELECT p.guid, p.label, p.language, p.isbn, p.nb_pages, p.publication_date, p.status,
           p.book_id, p.format_id, p.created_at, p.updated_at,
           f.guid AS f_guid, f.format_type AS f_format_type, f.language AS f_language,
           f.created_at AS f_created_at, f.updated_at AS f_updated_at
    FROM publishings p
    JOIN formats f ON f.guid = p.format_id
"#;

fn detail_from_row(row: &SqliteRow) -> Result<PublishingDetail> {
    Ok(PublishingDetail {
        publishing: Publishing::from_row(row)?,
        format: Format {
            id: guid(row, "f_guid")?,
            format_type: row.try_get("f_format_type")?,
            language: row.try_get("f_language")?,
            created_at: row.try_get("f_created_at")?,
            updated_at: row.try_get("f_updated_at")?,
        },
    })
}

/// Insert a validated publishing
pub async fn insert(conn: &mut SqliteConnection, new: &NewPublishing) -> Result<Publishing> {
    new.validate()?;
    // validate() guarantees both links are present
    let (Some(book_id), Some(format_id)) = (new.book_id, new.format_id) else {
        return Err(Error::Internal("Publishing links missing after validation".to_string()));
    };
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO publishings (
            guid, label, language, isbn, nb_pages, publication_date, status,
            book_id, format_id, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.id.to_string())
    .bind(&new.label)
    .bind(&new.language)
    .bind(&new.isbn)
    .bind(new.nb_pages)
    .bind(new.publication_date)
    .bind(new.status.as_str())
    .bind(book_id.to_string())
    .bind(format_id.to_string())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(Publishing {
        id: new.id,
        label: new.label.clone(),
        language: new.language.clone(),
        isbn: new.isbn.clone(),
        nb_pages: new.nb_pages,
        publication_date: new.publication_date,
        status: new.status,
        book_id,
        format_id,
        created_at: now,
        updated_at: now,
    })
}

pub async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<PublishingDetail> {
    let row = sqlx::query(&format!("{} WHERE p.guid = ?", SELECT_DETAIL))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Publishing {}", id)))?;

    detail_from_row(&row)
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<PublishingDetail>> {
    let rows = sqlx::query(&format!("{} ORDER BY p.created_at", SELECT_DETAIL))
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(detail_from_row).collect()
}

pub async fn list_for_book(
    conn: &mut SqliteConnection,
    book_id: Uuid,
) -> Result<Vec<PublishingDetail>> {
    let rows = sqlx::query(&format!(
        "{} WHERE p.book_id = ? ORDER BY p.created_at",
        SELECT_DETAIL
    ))
    .bind(book_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(detail_from_row).collect()
}

/// Moderate a publishing
pub async fn set_status(
    conn: &mut SqliteConnection,
    id: Uuid,
    status: Status,
) -> Result<PublishingDetail> {
    let result = sqlx::query("UPDATE publishings SET status = ?, updated_at = ? WHERE guid = ?")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Publishing {}", id)));
    }
    load(conn, id).await
}
