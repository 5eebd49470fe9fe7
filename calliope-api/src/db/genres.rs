//! Genre database operations and book/genre links

use calliope_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{guid, optional, required};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Genre {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: guid(row, "guid")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenreInput {
    pub name: String,
    pub description: Option<String>,
}

pub async fn create(conn: &mut SqliteConnection, input: GenreInput) -> Result<Genre> {
    let now = Utc::now();
    let genre = Genre {
        id: Uuid::new_v4(),
        name: required(&input.name, "name")?,
        description: optional(input.description.as_deref()),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO genres (guid, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(genre.id.to_string())
    .bind(&genre.name)
    .bind(&genre.description)
    .bind(genre.created_at)
    .bind(genre.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::on_unique(e, format!("Genre already exists: {}", genre.name)))?;

    Ok(genre)
}

/// Insert unless a genre with the same name exists; true if inserted
pub async fn insert_if_absent(conn: &mut SqliteConnection, genre: &Genre) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO genres (guid, name, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(name) DO NOTHING
        "#,
    )
    .bind(genre.id.to_string())
    .bind(&genre.name)
    .bind(&genre.description)
    .bind(genre.created_at)
    .bind(genre.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn find_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Genre>> {
    let row = sqlx::query(
        "SELECT guid, name, description, created_at, updated_at FROM genres WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(Genre::from_row).transpose()
}

pub async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<Genre> {
    let row = sqlx::query(
        "SELECT guid, name, description, created_at, updated_at FROM genres WHERE guid = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Genre {}", id)))?;

    Genre::from_row(&row)
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Genre>> {
    let rows = sqlx::query(
        "SELECT guid, name, description, created_at, updated_at FROM genres ORDER BY name",
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(Genre::from_row).collect()
}

pub async fn update(conn: &mut SqliteConnection, id: Uuid, input: GenreInput) -> Result<Genre> {
    let name = required(&input.name, "name")?;

    let result = sqlx::query(
        "UPDATE genres SET name = ?, description = ?, updated_at = ? WHERE guid = ?",
    )
    .bind(&name)
    .bind(optional(input.description.as_deref()))
    .bind(Utc::now())
    .bind(id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::on_unique(e, format!("Genre already exists: {}", name)))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Genre {}", id)));
    }
    load(conn, id).await
}

pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM genres WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Genre {}", id)));
    }
    Ok(())
}

/// Tag a book with a genre (no-op if already tagged)
pub async fn link_book(conn: &mut SqliteConnection, book_id: Uuid, genre_id: Uuid) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO book_genres (book_id, genre_id) VALUES (?, ?)")
        .bind(book_id.to_string())
        .bind(genre_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::on_foreign_key(e, "Unknown book or genre"))?;
    Ok(())
}

pub async fn unlink_book(conn: &mut SqliteConnection, book_id: Uuid, genre_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM book_genres WHERE book_id = ? AND genre_id = ?")
        .bind(book_id.to_string())
        .bind(genre_id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "Book {} is not tagged with genre {}",
            book_id, genre_id
        )));
    }
    Ok(())
}

pub async fn list_for_book(conn: &mut SqliteConnection, book_id: Uuid) -> Result<Vec<Genre>> {
    let rows = sqlx::query(
        r#"
        SELECT g.guid, g.name, g.description, g.created_at, g.updated_at
        FROM genres g
        JOIN book_genres bg ON bg.genre_id = g.guid
        WHERE bg.book_id = ?
        ORDER BY g.name
        "#,
    )
    .bind(book_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(Genre::from_row).collect()
}
