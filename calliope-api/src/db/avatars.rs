//! Avatar database operations

use calliope_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{guid, users};

/// Avatar image record; the bytes live in upload storage under `id`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Avatar {
    pub id: Uuid,
    pub filename: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Avatar {
    pub fn new(filename: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            user_id,
            created_at: Utc::now(),
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: guid(row, "guid")?,
            filename: row.try_get("filename")?,
            user_id: guid(row, "user_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

pub async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<Avatar> {
    let row = sqlx::query("SELECT guid, filename, user_id, created_at FROM avatars WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Avatar {}", id)))?;

    Avatar::from_row(&row)
}

/// Current avatar of a user
pub async fn load_for_user(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Avatar> {
    let user = users::load(conn, user_id).await?;
    let avatar_id = user
        .avatar_id
        .ok_or_else(|| Error::NotFound(format!("User {} has no avatar", user_id)))?;
    load(conn, avatar_id).await
}

/// Make `avatar` the user's current avatar
///
/// Returns the id of the avatar it replaced, whose row is deleted. The insert
/// comes first so a transaction takes the write lock before reading.
pub async fn replace(conn: &mut SqliteConnection, avatar: &Avatar) -> Result<Option<Uuid>> {
    sqlx::query("INSERT INTO avatars (guid, filename, user_id, created_at) VALUES (?, ?, ?, ?)")
        .bind(avatar.id.to_string())
        .bind(&avatar.filename)
        .bind(avatar.user_id.to_string())
        .bind(avatar.created_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::on_missing_reference(e, format!("User {}", avatar.user_id)))?;

    let previous = users::load(conn, avatar.user_id).await?.avatar_id;
    users::set_avatar(conn, avatar.user_id, Some(avatar.id)).await?;

    if let Some(old) = previous {
        sqlx::query("DELETE FROM avatars WHERE guid = ?")
            .bind(old.to_string())
            .execute(&mut *conn)
            .await?;
    }
    Ok(previous)
}

/// Ids of every avatar a user owns
pub async fn ids_for_user(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Vec<Uuid>> {
    let rows = sqlx::query("SELECT guid FROM avatars WHERE user_id = ?")
        .bind(user_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(|row| guid(row, "guid")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::{register, Enrollment, Registration};
    use calliope_common::auth::Role;
    use calliope_common::db::init::init_memory_database;

    #[tokio::test]
    async fn test_replace_avatar() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let user = register(
            &mut conn,
            Registration {
                username: "grace".to_string(),
                email: "grace@example.org".to_string(),
                password: "cobol forever".to_string(),
            },
            Enrollment::As(Role::User),
        )
        .await
        .unwrap();

        assert!(matches!(
            load_for_user(&mut conn, user.id).await,
            Err(Error::NotFound(_))
        ));

        let first = Avatar::new("me.png", user.id);
        assert_eq!(replace(&mut conn, &first).await.unwrap(), None);

        let second = Avatar::new("me2.jpg", user.id);
        assert_eq!(replace(&mut conn, &second).await.unwrap(), Some(first.id));

        let current = load_for_user(&mut conn, user.id).await.unwrap();
        assert_eq!(current.id, second.id);
        assert_eq!(current.filename, "me2.jpg");
        assert_eq!(ids_for_user(&mut conn, user.id).await.unwrap(), vec![second.id]);
    }
}
