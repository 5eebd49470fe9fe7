//! Book ingestion
//!
//! Turns one flat "create book" payload into linked Author, Book, Format,
//! Publishing and Cover rows, plus genre tags. Authors, formats and genres
//! are shared reference data and are found or created by natural key;
//! everything else is new per book.
//!
//! The whole sequence runs in a single transaction. A cover file written to
//! upload storage is removed again if the transaction does not commit.

use calliope_common::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use super::record_factory::{
    default_book, default_publishing, BookOverrides, PublishingOverrides, DEFAULT_LANGUAGE,
};
use super::reference_resolver::{resolve_author, resolve_format, resolve_genre};
use crate::db::books::{self, BookAggregate};
use crate::db::covers::{self, Cover};
use crate::db::{genres, publishings};
use crate::db::{optional, required};
use crate::storage::{DecodedUpload, UploadKind, UploadPayload, UploadStorage};

/// Page count as clients send it: a JSON number or a numeric string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PageCount {
    Number(i64),
    Text(String),
}

impl PageCount {
    fn parse(&self) -> Result<i64> {
        let pages = match self {
            PageCount::Number(n) => *n,
            PageCount::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                Error::InvalidInput(format!("nbPage must be a whole number, got {:?}", s))
            })?,
        };
        if pages < 0 {
            return Err(Error::InvalidInput(format!(
                "nbPage must not be negative, got {}",
                pages
            )));
        }
        Ok(pages)
    }
}

/// Flat book creation payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookInput {
    pub title: Option<String>,
    pub author: String,
    pub editor: Option<String>,
    pub format: String,
    pub language: Option<String>,
    pub isbn: Option<String>,
    pub nb_page: Option<PageCount>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    pub summary: Option<String>,
    pub cover: Option<UploadPayload>,
    /// Genre names to tag the book with
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Payload after every check that can run without the database
#[derive(Debug, Clone)]
struct ValidatedInput {
    title: Option<String>,
    author: String,
    editor: Option<String>,
    format: String,
    language: String,
    isbn: String,
    nb_pages: Option<i64>,
    date: Option<NaiveDate>,
    summary: Option<String>,
    cover: Option<DecodedUpload>,
    genres: Vec<String>,
}

impl CreateBookInput {
    fn validate(self, max_upload_bytes: usize) -> Result<ValidatedInput> {
        let date = self
            .date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| {
                NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|_| {
                    Error::InvalidInput(format!("date must be YYYY-MM-DD, got {:?}", d))
                })
            })
            .transpose()?;

        Ok(ValidatedInput {
            title: optional(self.title.as_deref()),
            author: required(&self.author, "author")?,
            editor: optional(self.editor.as_deref()),
            format: required(&self.format, "format")?,
            language: optional(self.language.as_deref())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            isbn: optional(self.isbn.as_deref()).unwrap_or_default(),
            nb_pages: self.nb_page.as_ref().map(PageCount::parse).transpose()?,
            date,
            summary: optional(self.summary.as_deref()),
            cover: self
                .cover
                .as_ref()
                .map(|c| c.decode(max_upload_bytes))
                .transpose()?,
            genres: self
                .genres
                .iter()
                .map(|g| required(g, "genre"))
                .collect::<Result<_>>()?,
        })
    }
}

/// Create a book and everything it links to, atomically
pub async fn create_book_entities(
    pool: &SqlitePool,
    storage: &UploadStorage,
    max_upload_bytes: usize,
    input: CreateBookInput,
) -> Result<BookAggregate> {
    let input = input.validate(max_upload_bytes)?;
    let cover_id = input.cover.as_ref().map(|_| Uuid::new_v4());

    let mut tx = pool.begin().await?;
    let ingested = ingest(&mut tx, storage, &input, cover_id).await;
    let outcome = match ingested {
        Ok(aggregate) => tx.commit().await.map(|()| aggregate).map_err(Error::from),
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback failed: {}", rollback);
            }
            Err(e)
        }
    };

    match outcome {
        Ok(aggregate) => {
            info!(
                "Ingested book {:?} ({}) by {}",
                aggregate.book.title, aggregate.book.id, aggregate.author.full_name
            );
            Ok(aggregate)
        }
        Err(e) => {
            warn!("Book ingestion failed, rolled back: {}", e);
            if let Some(id) = cover_id {
                if let Err(cleanup) = storage.remove(UploadKind::Cover, id).await {
                    warn!("Failed to remove orphaned cover file {}: {}", id, cleanup);
                }
            }
            Err(e)
        }
    }
}

async fn ingest(
    conn: &mut SqliteConnection,
    storage: &UploadStorage,
    input: &ValidatedInput,
    cover_id: Option<Uuid>,
) -> Result<BookAggregate> {
    let author = resolve_author(conn, &input.author).await?;

    let new_book = default_book(BookOverrides {
        title: input.title.clone(),
        summary: input.summary.clone(),
        publication_date: input.date,
        author_id: Some(author.id),
        ..Default::default()
    });
    let mut book = books::insert(conn, &new_book).await?;

    let format = resolve_format(conn, &input.format, &input.language).await?;

    let new_publishing = default_publishing(PublishingOverrides {
        label: input.editor.clone(),
        language: Some(input.language.clone()),
        isbn: Some(input.isbn.clone()),
        nb_pages: input.nb_pages,
        publication_date: input.date,
        book_id: Some(book.id),
        format_id: Some(format.id),
        ..Default::default()
    });
    publishings::insert(conn, &new_publishing).await?;

    for name in &input.genres {
        let genre = resolve_genre(conn, name).await?;
        genres::link_book(conn, book.id, genre.id).await?;
    }

    if let (Some(upload), Some(id)) = (&input.cover, cover_id) {
        let cover = Cover {
            id,
            ..Cover::new(upload.filename.clone(), book.id)
        };
        storage.save(UploadKind::Cover, cover.id, &upload.bytes).await?;
        covers::insert(conn, &cover).await?;
        book.cover_id = Some(cover.id);
    }

    books::save_links(conn, &mut book).await?;

    books::load_aggregate(conn, book.id).await
}
