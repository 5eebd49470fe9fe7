//! Comment database operations
//!
//! Each comment carries a 0-5 rating. The owning book's `rating` column is
//! the mean of its comment ratings and is recomputed after every write here.

use calliope_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{books, guid, required};

pub const MAX_RATING: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub content: String,
    pub rating: i64,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: guid(row, "guid")?,
            book_id: guid(row, "book_id")?,
            user_id: guid(row, "user_id")?,
            username: row.try_get("username")?,
            content: row.try_get("content")?,
            rating: row.try_get("rating")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentInput {
    pub content: String,
    pub rating: i64,
}

const SELECT_COMMENT: &str = r#"
    SELECT c.guid, c.book_id, c.user_id, u.username, c.content, c.rating, c.created_at
    FROM comments c
    JOIN users u ON u.guid = c.user_id
"#;

/// Add a comment and refresh the book rating
pub async fn create(
    conn: &mut SqliteConnection,
    book_id: Uuid,
    user_id: Uuid,
    input: CommentInput,
) -> Result<Comment> {
    let content = required(&input.content, "content")?;
    if !(0..=MAX_RATING).contains(&input.rating) {
        return Err(Error::InvalidInput(format!(
            "Rating must be between 0 and {}, got {}",
            MAX_RATING, input.rating
        )));
    }
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO comments (guid, book_id, user_id, content, rating, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(book_id.to_string())
    .bind(user_id.to_string())
    .bind(&content)
    .bind(input.rating)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::on_missing_reference(e, format!("Book {} or user {}", book_id, user_id)))?;

    refresh_book_rating(conn, book_id).await?;
    load(conn, id).await
}

pub async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<Comment> {
    let row = sqlx::query(&format!("{} WHERE c.guid = ?", SELECT_COMMENT))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Comment {}", id)))?;

    Comment::from_row(&row)
}

pub async fn list_for_book(conn: &mut SqliteConnection, book_id: Uuid) -> Result<Vec<Comment>> {
    let rows = sqlx::query(&format!(
        "{} WHERE c.book_id = ? ORDER BY c.created_at",
        SELECT_COMMENT
    ))
    .bind(book_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(Comment::from_row).collect()
}

/// Remove a comment and refresh the book rating
pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    let book_id: String = sqlx::query_scalar("DELETE FROM comments WHERE guid = ? RETURNING book_id")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Comment {}", id)))?;

    let book_id = Uuid::parse_str(&book_id)
        .map_err(|e| Error::Internal(format!("Bad book id {}: {}", book_id, e)))?;
    refresh_book_rating(conn, book_id).await?;
    Ok(())
}

/// Mean comment rating rounded to one decimal, 0 without comments
pub async fn refresh_book_rating(conn: &mut SqliteConnection, book_id: Uuid) -> Result<f64> {
    let mean: Option<f64> =
        sqlx::query_scalar("SELECT AVG(CAST(rating AS REAL)) FROM comments WHERE book_id = ?")
            .bind(book_id.to_string())
            .fetch_one(&mut *conn)
            .await?;

    let rating = round_rating(mean.unwrap_or(0.0));
    books::set_rating(conn, book_id, rating).await?;
    Ok(rating)
}

fn round_rating(mean: f64) -> f64 {
    (mean * 10.0).round() / 10.0
}
