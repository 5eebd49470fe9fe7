//! Publisher database operations

use calliope_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{guid, optional, required};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Publisher {
    pub id: Uuid,
    pub name: String,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Publisher {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: guid(row, "guid")?,
            name: row.try_get("name")?,
            country: row.try_get("country")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherInput {
    pub name: String,
    pub country: Option<String>,
}

const SELECT_PUBLISHER: &str =
    "SELECT guid, name, country, created_at, updated_at FROM publishers";

pub async fn create(conn: &mut SqliteConnection, input: PublisherInput) -> Result<Publisher> {
    let now = Utc::now();
    let publisher = Publisher {
        id: Uuid::new_v4(),
        name: required(&input.name, "name")?,
        country: optional(input.country.as_deref()),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO publishers (guid, name, country, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(publisher.id.to_string())
    .bind(&publisher.name)
    .bind(&publisher.country)
    .bind(publisher.created_at)
    .bind(publisher.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::on_unique(e, format!("Publisher already exists: {}", publisher.name)))?;

    Ok(publisher)
}

pub async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<Publisher> {
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT_PUBLISHER))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Publisher {}", id)))?;

    Publisher::from_row(&row)
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Publisher>> {
    let rows = sqlx::query(&format!("{} ORDER BY name", SELECT_PUBLISHER))
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(Publisher::from_row).collect()
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: Uuid,
    input: PublisherInput,
) -> Result<Publisher> {
    let name = required(&input.name, "name")?;

    let result = sqlx::query(
        "UPDATE publishers SET name = ?, country = ?, updated_at = ? WHERE guid = ?",
    )
    .bind(&name)
    .bind(optional(input.country.as_deref()))
    .bind(Utc::now())
    .bind(id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::on_unique(e, format!("Publisher already exists: {}", name)))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Publisher {}", id)));
    }
    load(conn, id).await
}

pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM publishers WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Publisher {}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calliope_common::db::init::init_memory_database;

    #[tokio::test]
    async fn test_publisher_crud() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let chilton = create(
            &mut conn,
            PublisherInput {
                name: " Chilton Books ".to_string(),
                country: Some("US".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(chilton.name, "Chilton Books");

        let updated = update(
            &mut conn,
            chilton.id,
            PublisherInput {
                name: "Chilton".to_string(),
                country: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Chilton");
        assert_eq!(updated.country, None);

        assert!(matches!(
            update(
                &mut conn,
                Uuid::new_v4(),
                PublisherInput {
                    name: "Ghost".to_string(),
                    country: None
                }
            )
            .await,
            Err(Error::NotFound(_))
        ));

        delete(&mut conn, chilton.id).await.unwrap();
        assert!(list(&mut conn).await.unwrap().is_empty());
    }
}
