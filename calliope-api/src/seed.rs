//! Demo catalogue
//!
//! Loads a handful of books through the same ingestion path the API uses,
//! genre tags included, so each book lands whole or not at all. Fixtures
//! whose title is already catalogued are skipped, so an interrupted seed can
//! simply be run again.

use std::collections::HashSet;

use calliope_common::Result;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::books;
use crate::services::book_ingestion::{create_book_entities, CreateBookInput, PageCount};
use crate::storage::UploadStorage;

struct Fixture {
    title: &'static str,
    author: &'static str,
    editor: &'static str,
    format: &'static str,
    language: &'static str,
    isbn: &'static str,
    pages: &'static str,
    date: &'static str,
    genre: &'static str,
}

const FIXTURES: &[Fixture] = &[
    Fixture {
        title: "Dune",
        author: "Frank Herbert",
        editor: "Chilton",
        format: "paper",
        language: "en",
        isbn: "0-8041-0000-0",
        pages: "412",
        date: "1965-08-01",
        genre: "Science fiction",
    },
    Fixture {
        title: "Dune Messiah",
        author: "Frank Herbert",
        editor: "Putnam",
        format: "paper",
        language: "en",
        isbn: "0-399-10227-1",
        pages: "256",
        date: "1969-10-15",
        genre: "Science fiction",
    },
    Fixture {
        title: "The Left Hand of Darkness",
        author: "Ursula K. Le Guin",
        editor: "Ace Books",
        format: "ebook",
        language: "en",
        isbn: "0-441-47812-3",
        pages: "286",
        date: "1969-03-01",
        genre: "Science fiction",
    },
    Fixture {
        title: "Les Misérables",
        author: "Victor Hugo",
        editor: "A. Lacroix, Verboeckhoven & Cie",
        format: "paper",
        language: "fr",
        isbn: "",
        pages: "1462",
        date: "1862-04-03",
        genre: "Historical fiction",
    },
];

/// Seed the demo catalogue; returns the number of books created
pub async fn seed_catalogue(
    pool: &SqlitePool,
    storage: &UploadStorage,
    max_upload_bytes: usize,
) -> Result<usize> {
    let existing: HashSet<String> = {
        let mut conn = pool.acquire().await?;
        books::list(&mut conn, None)
            .await?
            .into_iter()
            .map(|book| book.title)
            .collect()
    };

    let mut created = 0;
    for fixture in FIXTURES {
        if existing.contains(fixture.title) {
            debug!("Skipping {:?}, already catalogued", fixture.title);
            continue;
        }

        let input = CreateBookInput {
            title: Some(fixture.title.to_string()),
            author: fixture.author.to_string(),
            editor: Some(fixture.editor.to_string()),
            format: fixture.format.to_string(),
            language: Some(fixture.language.to_string()),
            isbn: Some(fixture.isbn.to_string()),
            nb_page: Some(PageCount::Text(fixture.pages.to_string())),
            date: Some(fixture.date.to_string()),
            summary: None,
            cover: None,
            genres: vec![fixture.genre.to_string()],
        };
        create_book_entities(pool, storage, max_upload_bytes, input).await?;
        created += 1;
    }

    info!("Seeded {} books", created);
    Ok(created)
}
