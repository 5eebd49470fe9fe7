//! Default-value construction for records before they are persisted
//!
//! Each `default_*` function starts from a fully populated baseline and
//! applies whatever the caller set in the overrides struct. A field set to
//! `Some` always wins over the default. Nothing here touches the database;
//! `validate` runs right before insert.

use calliope_common::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::Status;

pub const DEFAULT_BOOK_TITLE: &str = "Default Title";
pub const DEFAULT_FORMAT_TYPE: &str = "paper";
pub const DEFAULT_LANGUAGE: &str = "No language provided yet";
pub const DEFAULT_EDITOR: &str = "Unknown editor";

// ========================================
// Book
// ========================================

#[derive(Debug, Clone, Default)]
pub struct BookOverrides {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub status: Option<Status>,
    pub author_id: Option<Uuid>,
}

/// Book ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub status: Status,
    pub rating: f64,
    pub author_id: Option<Uuid>,
    pub cover_id: Option<Uuid>,
    pub publishing_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn default_book(overrides: BookOverrides) -> NewBook {
    let now = Utc::now();

    NewBook {
        id: Uuid::new_v4(),
        title: overrides
            .title
            .unwrap_or_else(|| DEFAULT_BOOK_TITLE.to_string()),
        summary: overrides.summary,
        publication_date: overrides.publication_date,
        status: overrides.status.unwrap_or_default(),
        rating: 0.0,
        author_id: overrides.author_id,
        cover_id: None,
        publishing_ids: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

impl NewBook {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("Book title must not be empty".to_string()));
        }
        if self.author_id.is_none() {
            return Err(Error::InvalidInput("Book requires an author".to_string()));
        }
        Ok(())
    }
}

// ========================================
// Format
// ========================================

#[derive(Debug, Clone, Default)]
pub struct FormatOverrides {
    pub format_type: Option<String>,
    pub language: Option<String>,
}

/// Format ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewFormat {
    pub format_type: String,
    pub language: String,
}

pub fn default_format(overrides: FormatOverrides) -> NewFormat {
    NewFormat {
        format_type: overrides
            .format_type
            .unwrap_or_else(|| DEFAULT_FORMAT_TYPE.to_string()),
        language: overrides
            .language
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
    }
}

impl NewFormat {
    pub fn validate(&self) -> Result<()> {
        if self.format_type.trim().is_empty() {
            return Err(Error::InvalidInput("Format type must not be empty".to_string()));
        }
        if self.language.trim().is_empty() {
            return Err(Error::InvalidInput("Format language must not be empty".to_string()));
        }
        Ok(())
    }
}

// ========================================
// Publishing
// ========================================

#[derive(Debug, Clone, Default)]
pub struct PublishingOverrides {
    pub label: Option<String>,
    pub language: Option<String>,
    pub isbn: Option<String>,
    pub nb_pages: Option<i64>,
    pub publication_date: Option<NaiveDate>,
    pub status: Option<Status>,
    pub book_id: Option<Uuid>,
    pub format_id: Option<Uuid>,
}

/// Publishing ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewPublishing {
    pub id: Uuid,
    pub label: String,
    pub language: String,
    pub isbn: String,
    pub nb_pages: i64,
    pub publication_date: NaiveDate,
    pub status: Status,
    pub book_id: Option<Uuid>,
    pub format_id: Option<Uuid>,
}

pub fn default_publishing(overrides: PublishingOverrides) -> NewPublishing {
    NewPublishing {
        id: Uuid::new_v4(),
        label: overrides
            .label
            .unwrap_or_else(|| DEFAULT_EDITOR.to_string()),
        language: overrides
            .language
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        isbn: overrides.isbn.unwrap_or_default(),
        nb_pages: overrides.nb_pages.unwrap_or(0),
        publication_date: overrides
            .publication_date
            .unwrap_or_else(|| Utc::now().date_naive()),
        status: overrides.status.unwrap_or_default(),
        book_id: overrides.book_id,
        format_id: overrides.format_id,
    }
}

impl NewPublishing {
    pub fn validate(&self) -> Result<()> {
        if self.nb_pages < 0 {
            return Err(Error::InvalidInput(format!(
                "Page count must not be negative, got {}",
                self.nb_pages
            )));
        }
        if self.book_id.is_none() {
            return Err(Error::InvalidInput("Publishing requires a book".to_string()));
        }
        if self.format_id.is_none() {
            return Err(Error::InvalidInput("Publishing requires a format".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_book_baseline() {
        let book = default_book(BookOverrides::default());
        assert_eq!(book.title, DEFAULT_BOOK_TITLE);
        assert_eq!(book.status, Status::Waiting);
        assert_eq!(book.rating, 0.0);
        assert!(book.publishing_ids.is_empty());
        assert_eq!(book.cover_id, None);
        assert_eq!(book.created_at, book.updated_at);
        assert!(book.validate().is_err(), "no author yet");
    }

    #[test]
    fn test_book_overrides_win() {
        let author = Uuid::new_v4();
        let book = default_book(BookOverrides {
            title: Some("Dune".to_string()),
            status: Some(Status::Accepted),
            publication_date: NaiveDate::from_ymd_opt(1965, 8, 1),
            author_id: Some(author),
            ..Default::default()
        });

        assert_eq!(book.title, "Dune");
        assert_eq!(book.status, Status::Accepted);
        assert_eq!(book.publication_date, NaiveDate::from_ymd_opt(1965, 8, 1));
        assert_eq!(book.author_id, Some(author));
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_default_format() {
        let baseline = default_format(FormatOverrides::default());
        assert_eq!(baseline.format_type, "paper");
        assert_eq!(baseline.language, DEFAULT_LANGUAGE);

        let ebook = default_format(FormatOverrides {
            format_type: Some("ebook".to_string()),
            ..Default::default()
        });
        assert_eq!(ebook.format_type, "ebook");
        assert_eq!(ebook.language, DEFAULT_LANGUAGE);

        let blank = default_format(FormatOverrides {
            format_type: Some(" ".to_string()),
            ..Default::default()
        });
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_default_publishing() {
        let baseline = default_publishing(PublishingOverrides::default());
        assert_eq!(baseline.label, DEFAULT_EDITOR);
        assert_eq!(baseline.nb_pages, 0);
        assert_eq!(baseline.status, Status::Waiting);
        assert_eq!(baseline.publication_date, Utc::now().date_naive());

        let publishing = default_publishing(PublishingOverrides {
            label: Some("Chilton".to_string()),
            isbn: Some("0-8041-0000-0".to_string()),
            nb_pages: Some(412),
            book_id: Some(Uuid::new_v4()),
            format_id: Some(Uuid::new_v4()),
            ..Default::default()
        });
        assert_eq!(publishing.label, "Chilton");
        assert_eq!(publishing.nb_pages, 412);
        assert!(publishing.validate().is_ok());

        let negative = default_publishing(PublishingOverrides {
            nb_pages: Some(-1),
            ..publishing_links()
        });
        assert!(negative.validate().is_err());
    }

    fn publishing_links() -> PublishingOverrides {
        PublishingOverrides {
            book_id: Some(Uuid::new_v4()),
            format_id: Some(Uuid::new_v4()),
            ..Default::default()
        }
    }
}
