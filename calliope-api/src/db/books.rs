//! Book database operations
//!
//! A book row only points at its author and cover. Publishings and genres
//! point back at the book and are gathered by [`load_aggregate`].

use calliope_common::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::authors::{self, Author};
use super::covers::{self, Cover};
use super::genres::{self, Genre};
use super::publishings::{self, PublishingDetail};
use super::{guid, opt_guid, parsed, Status};
use crate::services::record_factory::NewBook;

/// Book record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub status: Status,
    pub rating: f64,
    pub author_id: Uuid,
    pub cover_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: guid(row, "guid")?,
            title: row.try_get("title")?,
            summary: row.try_get("summary")?,
            publication_date: row.try_get("publication_date")?,
            status: parsed(row, "status")?,
            rating: row.try_get("rating")?,
            author_id: guid(row, "author_id")?,
            cover_id: opt_guid(row, "cover_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Book with everything linked to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookAggregate {
    #[serde(flatten)]
    pub book: Book,
    pub author: Author,
    pub cover: Option<Cover>,
    pub publishings: Vec<PublishingDetail>,
    pub genres: Vec<Genre>,
}

/// Partial book update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookUpdate {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub status: Option<Status>,
    pub publication_date: Option<NaiveDate>,
}

const SELECT_BOOK: &str = r#"
    SELECT guid, title, summary, publication_date, status, rating,
           author_id, cover_id, created_at, updated_at
    FROM books
"#;

/// Insert a validated book
pub async fn insert(conn: &mut SqliteConnection, new: &NewBook) -> Result<Book> {
    new.validate()?;
    let Some(author_id) = new.author_id else {
        return Err(Error::Internal("Book author missing after validation".to_string()));
    };

    sqlx::query(
        r#"
        INSERT INTO books (
            guid, title, summary, publication_date, status, rating,
            author_id, cover_id, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.id.to_string())
    .bind(new.title.trim())
    .bind(&new.summary)
    .bind(new.publication_date)
    .bind(new.status.as_str())
    .bind(new.rating)
    .bind(author_id.to_string())
    .bind(new.cover_id.map(|id| id.to_string()))
    .bind(new.created_at)
    .bind(new.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::on_foreign_key(e, format!("Unknown author {}", author_id)))?;

    Ok(Book {
        id: new.id,
        title: new.title.trim().to_string(),
        summary: new.summary.clone(),
        publication_date: new.publication_date,
        status: new.status,
        rating: new.rating,
        author_id,
        cover_id: new.cover_id,
        created_at: new.created_at,
        updated_at: new.updated_at,
    })
}

/// Persist a book's cover link, stamping `updated_at`
pub async fn save_links(conn: &mut SqliteConnection, book: &mut Book) -> Result<()> {
    book.updated_at = Utc::now();

    let result = sqlx::query("UPDATE books SET cover_id = ?, updated_at = ? WHERE guid = ?")
        .bind(book.cover_id.map(|id| id.to_string()))
        .bind(book.updated_at)
        .bind(book.id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Book {}", book.id)));
    }
    Ok(())
}

pub async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<Book> {
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT_BOOK))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Book {}", id)))?;

    Book::from_row(&row)
}

/// Load a book with author, cover, publishings and genres
pub async fn load_aggregate(conn: &mut SqliteConnection, id: Uuid) -> Result<BookAggregate> {
    let book = load(conn, id).await?;
    let author = authors::load(conn, book.author_id).await?;
    let cover = match book.cover_id {
        Some(cover_id) => Some(covers::load(conn, cover_id).await?),
        None => None,
    };
    let publishings = publishings::list_for_book(conn, id).await?;
    let genres = genres::list_for_book(conn, id).await?;

    Ok(BookAggregate {
        book,
        author,
        cover,
        publishings,
        genres,
    })
}

pub async fn list(conn: &mut SqliteConnection, status: Option<Status>) -> Result<Vec<Book>> {
    let rows = match status {
        Some(status) => {
            sqlx::query(&format!("{} WHERE status = ? ORDER BY title", SELECT_BOOK))
                .bind(status.as_str())
                .fetch_all(&mut *conn)
                .await?
        }
        None => {
            sqlx::query(&format!("{} ORDER BY title", SELECT_BOOK))
                .fetch_all(&mut *conn)
                .await?
        }
    };

    rows.iter().map(Book::from_row).collect()
}

pub async fn list_by_author(conn: &mut SqliteConnection, author_id: Uuid) -> Result<Vec<Book>> {
    let rows = sqlx::query(&format!("{} WHERE author_id = ? ORDER BY title", SELECT_BOOK))
        .bind(author_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(Book::from_row).collect()
}

pub async fn update(conn: &mut SqliteConnection, id: Uuid, changes: BookUpdate) -> Result<Book> {
    let mut book = load(conn, id).await?;

    if let Some(title) = changes.title {
        book.title = super::required(&title, "title")?;
    }
    if let Some(summary) = changes.summary {
        book.summary = super::optional(Some(&summary));
    }
    if let Some(status) = changes.status {
        book.status = status;
    }
    if let Some(date) = changes.publication_date {
        book.publication_date = Some(date);
    }
    book.updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE books
        SET title = ?, summary = ?, status = ?, publication_date = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&book.title)
    .bind(&book.summary)
    .bind(book.status.as_str())
    .bind(book.publication_date)
    .bind(book.updated_at)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(book)
}

/// Store a new rating value
pub async fn set_rating(conn: &mut SqliteConnection, id: Uuid, rating: f64) -> Result<()> {
    sqlx::query("UPDATE books SET rating = ?, updated_at = ? WHERE guid = ?")
        .bind(rating)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Delete a book; its covers, publishings, comments and genre links cascade
///
/// Returns the ids of the deleted covers so their files can be removed.
pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<Vec<Uuid>> {
    let cover_rows = sqlx::query("SELECT guid FROM covers WHERE book_id = ?")
        .bind(id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    let cover_ids = cover_rows
        .iter()
        .map(|row| guid(row, "guid"))
        .collect::<Result<Vec<_>>>()?;

    let result = sqlx::query("DELETE FROM books WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Book {}", id)));
    }
    Ok(cover_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::record_factory::{default_book, BookOverrides};
    use calliope_common::db::init::init_memory_database;

    async fn seeded_author(conn: &mut SqliteConnection) -> Author {
        let author = Author::from_full_name("Frank Herbert").unwrap();
        authors::insert(conn, &author).await.unwrap();
        author
    }

    #[tokio::test]
    async fn test_insert_requires_known_author() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let orphan = default_book(BookOverrides {
            author_id: Some(Uuid::new_v4()),
            ..Default::default()
        });
        assert!(matches!(insert(&mut conn, &orphan).await, Err(Error::Conflict(_))));

        let anonymous = default_book(BookOverrides::default());
        assert!(matches!(
            insert(&mut conn, &anonymous).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_filter_by_status() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let author = seeded_author(&mut conn).await;

        let dune = insert(
            &mut conn,
            &default_book(BookOverrides {
                title: Some("Dune".to_string()),
                author_id: Some(author.id),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        insert(
            &mut conn,
            &default_book(BookOverrides {
                title: Some("Dune Messiah".to_string()),
                author_id: Some(author.id),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        let accepted = update(
            &mut conn,
            dune.id,
            BookUpdate {
                status: Some(Status::Accepted),
                summary: Some("Spice.".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(accepted.status, Status::Accepted);
        assert_eq!(accepted.title, "Dune");

        let only_accepted = list(&mut conn, Some(Status::Accepted)).await.unwrap();
        assert_eq!(only_accepted.len(), 1);
        assert_eq!(only_accepted[0].id, dune.id);
        assert_eq!(list(&mut conn, None).await.unwrap().len(), 2);
        assert_eq!(list_by_author(&mut conn, author.id).await.unwrap().len(), 2);

        let blank_title = update(
            &mut conn,
            dune.id,
            BookUpdate {
                title: Some("  ".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(blank_title, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete_book_then_author() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let author = seeded_author(&mut conn).await;

        let book = insert(
            &mut conn,
            &default_book(BookOverrides {
                author_id: Some(author.id),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert!(matches!(
            authors::delete(&mut conn, author.id).await,
            Err(Error::Conflict(_))
        ));

        assert!(delete(&mut conn, book.id).await.unwrap().is_empty());
        authors::delete(&mut conn, author.id).await.unwrap();
    }
}
