//! Format database operations
//!
//! `format_type` ("paper", "ebook", ...) is the natural key.

use calliope_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::guid;
use crate::services::record_factory::NewFormat;

/// Format record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Format {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub format_type: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Format {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: guid(row, "guid")?,
            format_type: row.try_get("format_type")?,
            language: row.try_get("language")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Format fields accepted from clients
#[derive(Debug, Clone, Deserialize)]
pub struct FormatInput {
    #[serde(rename = "type")]
    pub format_type: String,
    pub language: Option<String>,
}

const SELECT_FORMAT: &str = r#"
    SELECT guid, format_type, language, created_at, updated_at
    FROM formats
"#;

/// Insert a validated format, failing with `Conflict` if the type exists
pub async fn insert(conn: &mut SqliteConnection, new: &NewFormat) -> Result<Format> {
    new.validate()?;
    let now = Utc::now();
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO formats (guid, format_type, language, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&new.format_type)
    .bind(&new.language)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::on_unique(e, format!("Format already exists: {}", new.format_type)))?;

    Ok(Format {
        id,
        format_type: new.format_type.clone(),
        language: new.language.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Insert unless the type exists; returns true if this call created the row
pub async fn insert_if_absent(conn: &mut SqliteConnection, new: &NewFormat) -> Result<bool> {
    new.validate()?;
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO formats (guid, format_type, language, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(format_type) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&new.format_type)
    .bind(&new.language)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn find_by_type(conn: &mut SqliteConnection, format_type: &str) -> Result<Option<Format>> {
    let row = sqlx::query(&format!("{} WHERE format_type = ?", SELECT_FORMAT))
        .bind(format_type)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(Format::from_row).transpose()
}

pub async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<Format> {
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT_FORMAT))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Format {}", id)))?;

    Format::from_row(&row)
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Format>> {
    let rows = sqlx::query(&format!("{} ORDER BY format_type", SELECT_FORMAT))
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(Format::from_row).collect()
}

pub async fn update(conn: &mut SqliteConnection, id: Uuid, new: &NewFormat) -> Result<Format> {
    new.validate()?;

    let result = sqlx::query(
        "UPDATE formats SET format_type = ?, language = ?, updated_at = ? WHERE guid = ?",
    )
    .bind(&new.format_type)
    .bind(&new.language)
    .bind(Utc::now())
    .bind(id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::on_unique(e, format!("Format already exists: {}", new.format_type)))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Format {}", id)));
    }
    load(conn, id).await
}

/// Delete a format; refused while publishings still reference it
pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM formats WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::on_foreign_key(e, format!("Format {} is still in use", id)))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Format {}", id)));
    }
    Ok(())
}
