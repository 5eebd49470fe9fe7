//! Find-or-create for the natural-keyed references of a book
//!
//! Every lookup inserts with `ON CONFLICT DO NOTHING` and then selects, so two
//! concurrent ingestions naming the same author end up sharing one row.

use calliope_common::{Error, Result};
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use super::record_factory::{default_format, FormatOverrides};
use crate::db::authors::{self, Author};
use crate::db::formats::{self, Format};
use crate::db::genres::{self, Genre};
use crate::db::required;

/// Return the author with this full name, creating a placeholder if needed
pub async fn resolve_author(conn: &mut SqliteConnection, full_name: &str) -> Result<Author> {
    let candidate = Author::from_full_name(full_name)?;

    if authors::insert_if_absent(conn, &candidate).await? {
        debug!("Created author {} ({})", candidate.full_name, candidate.id);
    }

    authors::find_by_full_name(conn, &candidate.full_name)
        .await?
        .ok_or_else(|| {
            Error::Internal(format!("Author {} vanished after insert", candidate.full_name))
        })
}

/// Return the format with this type, creating it with `language` if needed
///
/// An existing format keeps the language it was first stored with.
pub async fn resolve_format(
    conn: &mut SqliteConnection,
    format_type: &str,
    language: &str,
) -> Result<Format> {
    let candidate = default_format(FormatOverrides {
        format_type: Some(format_type.trim().to_string()),
        language: Some(language.trim().to_string()),
    });

    if formats::insert_if_absent(conn, &candidate).await? {
        debug!("Created format {}", candidate.format_type);
    }

    formats::find_by_type(conn, &candidate.format_type)
        .await?
        .ok_or_else(|| {
            Error::Internal(format!("Format {} vanished after insert", candidate.format_type))
        })
}

/// Return the genre with this name, creating it without a description if needed
pub async fn resolve_genre(conn: &mut SqliteConnection, name: &str) -> Result<Genre> {
    let now = Utc::now();
    let candidate = Genre {
        id: Uuid::new_v4(),
        name: required(name, "genre")?,
        description: None,
        created_at: now,
        updated_at: now,
    };

    if genres::insert_if_absent(conn, &candidate).await? {
        debug!("Created genre {}", candidate.name);
    }

    genres::find_by_name(conn, &candidate.name)
        .await?
        .ok_or_else(|| Error::Internal(format!("Genre {} vanished after insert", candidate.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calliope_common::db::init::init_memory_database;

    #[tokio::test]
    async fn test_resolve_author_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = resolve_author(&mut conn, "Frank Herbert").await.unwrap();
        assert_eq!(first.first_name, "Frank");
        assert_eq!(first.last_name, "Herbert");
        assert_eq!(first.email, None);
        assert_eq!(first.birth_date, None);

        let second = resolve_author(&mut conn, "  Frank   Herbert ").await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(authors::list(&mut conn).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_author_rejects_blank() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        assert!(matches!(
            resolve_author(&mut conn, "   ").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_format_is_idempotent_by_type() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let paper = resolve_format(&mut conn, "paper", "en").await.unwrap();
        let again = resolve_format(&mut conn, "paper", "fr").await.unwrap();
        assert_eq!(again.id, paper.id);
        assert_eq!(again.language, "en");

        let ebook = resolve_format(&mut conn, "ebook", "en").await.unwrap();
        assert_ne!(ebook.id, paper.id);
        assert_eq!(formats::list(&mut conn).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_genre_is_idempotent_by_name() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = resolve_genre(&mut conn, "Science fiction").await.unwrap();
        let again = resolve_genre(&mut conn, " Science fiction ").await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(genres::list(&mut conn).await.unwrap().len(), 1);

        assert!(matches!(resolve_genre(&mut conn, "").await, Err(Error::InvalidInput(_))));
    }
}
