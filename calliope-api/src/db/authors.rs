//! Author database operations

use calliope_common::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{guid, optional, required};

/// Author record
///
/// `full_name` is the natural key: two authors never share it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Author {
    /// Build an author known only by name; email and birth date stay unknown
    ///
    /// The first word becomes the first name, the rest the last name.
    pub fn from_full_name(full_name: &str) -> Result<Self> {
        let full_name = collapse_whitespace(&required(full_name, "author")?);
        let (first_name, last_name) = match full_name.split_once(' ') {
            Some((first, last)) => (first.to_string(), last.to_string()),
            None => (full_name.clone(), String::new()),
        };
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            first_name,
            last_name,
            full_name,
            email: None,
            birth_date: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: guid(row, "guid")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            birth_date: row.try_get("birth_date")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Author fields accepted from clients
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorInput {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl AuthorInput {
    fn into_author(self, id: Uuid, created_at: DateTime<Utc>) -> Result<Author> {
        let first_name = required(&self.first_name, "firstName")?;
        let last_name = self.last_name.trim().to_string();
        let full_name = collapse_whitespace(&format!("{} {}", first_name, last_name));

        Ok(Author {
            id,
            first_name,
            last_name,
            full_name,
            email: optional(self.email.as_deref()),
            birth_date: self.birth_date,
            created_at,
            updated_at: Utc::now(),
        })
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

const SELECT_AUTHOR: &str = r#"
    SELECT guid, first_name, last_name, full_name, email, birth_date, created_at, updated_at
    FROM authors
"#;

/// Insert a new author, failing with `Conflict` if the full name is taken
pub async fn insert(conn: &mut SqliteConnection, author: &Author) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO authors (
            guid, first_name, last_name, full_name, email, birth_date, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(author.id.to_string())
    .bind(&author.first_name)
    .bind(&author.last_name)
    .bind(&author.full_name)
    .bind(&author.email)
    .bind(author.birth_date)
    .bind(author.created_at)
    .bind(author.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::on_unique(e, format!("Author already exists: {}", author.full_name)))?;

    Ok(())
}

/// Insert unless an author with the same full name exists
///
/// Returns true if this call created the row.
pub async fn insert_if_absent(conn: &mut SqliteConnection, author: &Author) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO authors (
            guid, first_name, last_name, full_name, email, birth_date, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(full_name) DO NOTHING
        "#,
    )
    .bind(author.id.to_string())
    .bind(&author.first_name)
    .bind(&author.last_name)
    .bind(&author.full_name)
    .bind(&author.email)
    .bind(author.birth_date)
    .bind(author.created_at)
    .bind(author.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Load author by natural key
pub async fn find_by_full_name(
    conn: &mut SqliteConnection,
    full_name: &str,
) -> Result<Option<Author>> {
    let row = sqlx::query(&format!("{} WHERE full_name = ?", SELECT_AUTHOR))
        .bind(full_name)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(Author::from_row).transpose()
}

/// Load author by id
pub async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<Author> {
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT_AUTHOR))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Author {}", id)))?;

    Author::from_row(&row)
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Author>> {
    let rows = sqlx::query(&format!("{} ORDER BY last_name, first_name", SELECT_AUTHOR))
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(Author::from_row).collect()
}

/// Create an author from client input
pub async fn create(conn: &mut SqliteConnection, input: AuthorInput) -> Result<Author> {
    let author = input.into_author(Uuid::new_v4(), Utc::now())?;
    insert(conn, &author).await?;
    Ok(author)
}

/// Replace an author's fields
pub async fn update(conn: &mut SqliteConnection, id: Uuid, input: AuthorInput) -> Result<Author> {
    let existing = load(conn, id).await?;
    let author = input.into_author(id, existing.created_at)?;

    sqlx::query(
        r#"
        UPDATE authors
        SET first_name = ?, last_name = ?, full_name = ?, email = ?, birth_date = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&author.first_name)
    .bind(&author.last_name)
    .bind(&author.full_name)
    .bind(&author.email)
    .bind(author.birth_date)
    .bind(author.updated_at)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::on_unique(e, format!("Author already exists: {}", author.full_name)))?;

    Ok(author)
}

/// Delete an author; refused while books still reference it
pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM authors WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::on_foreign_key(e, format!("Author {} still has books", id)))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Author {}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calliope_common::db::init::init_memory_database;

    #[test]
    fn test_from_full_name_splits_first_word() {
        let author = Author::from_full_name("  Ursula  K. Le Guin ").unwrap();
        assert_eq!(author.full_name, "Ursula K. Le Guin");
        assert_eq!(author.first_name, "Ursula");
        assert_eq!(author.last_name, "K. Le Guin");
        assert_eq!(author.email, None);
        assert_eq!(author.birth_date, None);

        let mononym = Author::from_full_name("Homer").unwrap();
        assert_eq!(mononym.first_name, "Homer");
        assert_eq!(mononym.last_name, "");

        assert!(Author::from_full_name("   ").is_err());
    }

    #[tokio::test]
    async fn test_insert_if_absent_only_once() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = Author::from_full_name("Frank Herbert").unwrap();
        let second = Author::from_full_name("Frank Herbert").unwrap();

        assert!(insert_if_absent(&mut conn, &first).await.unwrap());
        assert!(!insert_if_absent(&mut conn, &second).await.unwrap());

        let stored = find_by_full_name(&mut conn, "Frank Herbert")
            .await
            .unwrap()
            .expect("author stored");
        assert_eq!(stored.id, first.id);
    }

    #[tokio::test]
    async fn test_crud_roundtrip() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let created = create(
            &mut conn,
            AuthorInput {
                first_name: "Mary".to_string(),
                last_name: "Shelley".to_string(),
                email: Some(" ".to_string()),
                birth_date: NaiveDate::from_ymd_opt(1797, 8, 30),
            },
        )
        .await
        .unwrap();
        assert_eq!(created.full_name, "Mary Shelley");
        assert_eq!(created.email, None);

        let loaded = load(&mut conn, created.id).await.unwrap();
        assert_eq!(loaded.birth_date, NaiveDate::from_ymd_opt(1797, 8, 30));

        let updated = update(
            &mut conn,
            created.id,
            AuthorInput {
                first_name: "Mary".to_string(),
                last_name: "Wollstonecraft Shelley".to_string(),
                email: Some("mary@example.org".to_string()),
                birth_date: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.full_name, "Mary Wollstonecraft Shelley");

        assert_eq!(list(&mut conn).await.unwrap().len(), 1);

        delete(&mut conn, created.id).await.unwrap();
        assert!(matches!(load(&mut conn, created.id).await, Err(Error::NotFound(_))));
        assert!(matches!(delete(&mut conn, created.id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_full_name_conflicts() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let input = AuthorInput {
            first_name: "Frank".to_string(),
            last_name: "Herbert".to_string(),
            email: None,
            birth_date: None,
        };
        create(&mut conn, input.clone()).await.unwrap();

        assert!(matches!(create(&mut conn, input).await, Err(Error::Conflict(_))));
    }
}
