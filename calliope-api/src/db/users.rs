//! User account database operations

use calliope_common::auth::{hash_password, verify_password, Role};
use calliope_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{guid, opt_guid, parsed, required};

/// User record
///
/// Credentials never leave this module in serialized form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    pub role: Role,
    pub avatar_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: guid(row, "guid")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            password_salt: row.try_get("password_salt")?,
            role: parsed(row, "role")?,
            avatar_id: opt_guid(row, "avatar_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Registration request body
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub const MIN_PASSWORD_LEN: usize = 8;

const SELECT_USER: &str = r#"
    SELECT guid, username, email, password_hash, password_salt, role, avatar_id,
           created_at, updated_at
    FROM users
"#;

/// Which role a new account receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrollment {
    /// Always this role
    As(Role),
    /// Administrator when no account exists yet, otherwise a plain user
    FirstIsAdmin,
}

impl Enrollment {
    fn fixed_role(self) -> Option<&'static str> {
        match self {
            Enrollment::As(role) => Some(role.as_str()),
            Enrollment::FirstIsAdmin => None,
        }
    }
}

/// Create an account
///
/// The role is settled by the INSERT itself, so concurrent first
/// registrations cannot both become administrators.
pub async fn register(
    conn: &mut SqliteConnection,
    registration: Registration,
    enrollment: Enrollment,
) -> Result<User> {
    let username = required(&registration.username, "username")?;
    let email = required(&registration.email, "email")?.to_lowercase();
    if !email.contains('@') {
        return Err(Error::InvalidInput(format!("Not an email address: {}", email)));
    }
    if registration.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let credentials = hash_password(&registration.password);
    let now = Utc::now();
    let id = Uuid::new_v4();

    let role: String = sqlx::query_scalar(
        r#"
        INSERT INTO users (
            guid, username, email, password_hash, password_salt, role, avatar_id,
            created_at, updated_at
        ) VALUES (
            ?, ?, ?, ?, ?,
            COALESCE(?, CASE WHEN EXISTS (SELECT 1 FROM users) THEN 'user' ELSE 'admin' END),
            NULL, ?, ?
        )
        RETURNING role
        "#,
    )
    .bind(id.to_string())
    .bind(&username)
    .bind(&email)
    .bind(&credentials.hash)
    .bind(&credentials.salt)
    .bind(enrollment.fixed_role())
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| Error::on_unique(e, "Username or email already registered"))?;

    Ok(User {
        id,
        username,
        email,
        password_hash: credentials.hash,
        password_salt: credentials.salt,
        role: role.parse()?,
        avatar_id: None,
        created_at: now,
        updated_at: now,
    })
}

/// Check a username/password pair
///
/// Unknown users and wrong passwords produce the same error.
pub async fn authenticate(
    conn: &mut SqliteConnection,
    username: &str,
    password: &str,
) -> Result<User> {
    let rejected = || Error::Unauthorized("Invalid username or password".to_string());

    let user = find_by_username(conn, username.trim())
        .await?
        .ok_or_else(rejected)?;

    if !verify_password(password, &user.password_hash, &user.password_salt) {
        return Err(rejected());
    }
    Ok(user)
}

pub async fn find_by_username(conn: &mut SqliteConnection, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE username = ?", SELECT_USER))
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(User::from_row).transpose()
}

pub async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<User> {
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT_USER))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", id)))?;

    User::from_row(&row)
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!("{} ORDER BY username", SELECT_USER))
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(User::from_row).collect()
}

pub async fn count(conn: &mut SqliteConnection) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

pub async fn set_avatar(conn: &mut SqliteConnection, id: Uuid, avatar_id: Option<Uuid>) -> Result<()> {
    let result = sqlx::query("UPDATE users SET avatar_id = ?, updated_at = ? WHERE guid = ?")
        .bind(avatar_id.map(|a| a.to_string()))
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User {}", id)));
    }
    Ok(())
}

/// Delete an account; avatars, comments and payments cascade
pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM users WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User {}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calliope_common::db::init::init_memory_database;

    fn ada() -> Registration {
        Registration {
            username: "ada".to_string(),
            email: "Ada@Example.org".to_string(),
            password: "analytical engine".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let user = register(&mut conn, ada(), Enrollment::As(Role::User)).await.unwrap();
        assert_eq!(user.email, "ada@example.org");
        assert_eq!(user.role, Role::User);

        let logged_in = authenticate(&mut conn, "ada", "analytical engine").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        assert!(matches!(
            authenticate(&mut conn, "ada", "difference engine").await,
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate(&mut conn, "babbage", "analytical engine").await,
            Err(Error::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        register(&mut conn, ada(), Enrollment::As(Role::User)).await.unwrap();
        let again = register(
            &mut conn,
            Registration {
                email: "other@example.org".to_string(),
                ..ada()
            },
            Enrollment::As(Role::User),
        )
        .await;
        assert!(matches!(again, Err(Error::Conflict(_))));
        assert_eq!(count(&mut conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_registration_validation() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let short = Registration {
            password: "short".to_string(),
            ..ada()
        };
        assert!(matches!(
            register(&mut conn, short, Enrollment::As(Role::User)).await,
            Err(Error::InvalidInput(_))
        ));

        let no_at = Registration {
            email: "ada.example.org".to_string(),
            ..ada()
        };
        assert!(matches!(
            register(&mut conn, no_at, Enrollment::As(Role::User)).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_first_enrollment_is_admin() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = register(&mut conn, ada(), Enrollment::FirstIsAdmin).await.unwrap();
        assert_eq!(first.role, Role::Admin);

        let second = register(
            &mut conn,
            Registration {
                username: "babbage".to_string(),
                email: "babbage@example.org".to_string(),
                password: "difference engine".to_string(),
            },
            Enrollment::FirstIsAdmin,
        )
        .await
        .unwrap();
        assert_eq!(second.role, Role::User);
        assert_eq!(load(&mut conn, second.id).await.unwrap().role, Role::User);
    }

    #[test]
    fn test_credentials_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "ada".to_string(),
            email: "ada@example.org".to_string(),
            password_hash: "h".to_string(),
            password_salt: "s".to_string(),
            role: Role::Admin,
            avatar_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert!(value.get("passwordSalt").is_none());
        assert_eq!(value["role"], "admin");
    }
}
