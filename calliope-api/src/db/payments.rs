//! Payment database operations
//!
//! Payments are recorded locally only. A payment starts `pending` and moves
//! exactly once to `succeeded`, `failed` or `cancelled`.

use calliope_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::str::FromStr;
use uuid::Uuid;

use super::{books, guid, opt_guid, parsed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(Error::InvalidInput(format!("Unknown payment status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: guid(row, "guid")?,
            user_id: guid(row, "user_id")?,
            book_id: opt_guid(row, "book_id")?,
            amount_cents: row.try_get("amount_cents")?,
            currency: row.try_get("currency")?,
            status: parsed(row, "status")?,
            reference: row.try_get("reference")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInput {
    pub book_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
}

const SELECT_PAYMENT: &str = r#"
    SELECT guid, user_id, book_id, amount_cents, currency, status, reference,
           created_at, updated_at
    FROM payments
"#;

fn normalize_currency(currency: &str) -> Result<String> {
    let code = currency.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::InvalidInput(format!(
            "Currency must be a 3-letter code, got {:?}",
            currency
        )));
    }
    Ok(code)
}

/// Record a pending payment for `user_id`
pub async fn create(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    input: PaymentInput,
) -> Result<Payment> {
    if input.amount_cents <= 0 {
        return Err(Error::InvalidInput(format!(
            "Amount must be positive, got {}",
            input.amount_cents
        )));
    }
    let currency = normalize_currency(&input.currency)?;
    if let Some(book_id) = input.book_id {
        books::load(conn, book_id).await?;
    }

    let now = Utc::now();
    let id = Uuid::new_v4();
    let payment = Payment {
        id,
        user_id,
        book_id: input.book_id,
        amount_cents: input.amount_cents,
        currency,
        status: PaymentStatus::Pending,
        reference: format!("PAY-{}", id.simple()).to_uppercase(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO payments (
            guid, user_id, book_id, amount_cents, currency, status, reference,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payment.id.to_string())
    .bind(payment.user_id.to_string())
    .bind(payment.book_id.map(|b| b.to_string()))
    .bind(payment.amount_cents)
    .bind(&payment.currency)
    .bind(payment.status.as_str())
    .bind(&payment.reference)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::on_foreign_key(e, format!("Unknown user {}", user_id)))?;

    Ok(payment)
}

pub async fn load(conn: &mut SqliteConnection, id: Uuid) -> Result<Payment> {
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT_PAYMENT))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Payment {}", id)))?;

    Payment::from_row(&row)
}

pub async fn list_for_user(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Vec<Payment>> {
    let rows = sqlx::query(&format!(
        "{} WHERE user_id = ? ORDER BY created_at DESC",
        SELECT_PAYMENT
    ))
    .bind(user_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(Payment::from_row).collect()
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Payment>> {
    let rows = sqlx::query(&format!("{} ORDER BY created_at DESC", SELECT_PAYMENT))
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(Payment::from_row).collect()
}

/// Move a pending payment to a final status
pub async fn transition(
    conn: &mut SqliteConnection,
    id: Uuid,
    to: PaymentStatus,
) -> Result<Payment> {
    if to == PaymentStatus::Pending {
        return Err(Error::InvalidInput("Cannot move a payment back to pending".to_string()));
    }

    // only a pending row matches
    let result = sqlx::query(
        "UPDATE payments SET status = ?, updated_at = ? WHERE guid = ? AND status = 'pending'",
    )
    .bind(to.as_str())
    .bind(Utc::now())
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    let payment = load(conn, id).await?;
    if result.rows_affected() == 0 {
        return Err(Error::Conflict(format!(
            "Payment {} is already {}",
            id,
            payment.status.as_str()
        )));
    }
    Ok(payment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::{register, Enrollment, Registration};
    use calliope_common::auth::Role;
    use calliope_common::db::init::init_memory_database;

    async fn user(conn: &mut SqliteConnection) -> Uuid {
        register(
            conn,
            Registration {
                username: "buyer".to_string(),
                email: "buyer@example.org".to_string(),
                password: "open sesame".to_string(),
            },
            Enrollment::As(Role::User),
        )
        .await
        .unwrap()
        .id
    }

    fn input(amount_cents: i64, currency: &str) -> PaymentInput {
        PaymentInput {
            book_id: None,
            amount_cents,
            currency: currency.to_string(),
        }
    }

    #[tokio::test]
    async fn test_payment_lifecycle() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let user_id = user(&mut conn).await;

        let payment = create(&mut conn, user_id, input(1299, "eur")).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.currency, "EUR");
        assert!(payment.reference.starts_with("PAY-"));

        let paid = transition(&mut conn, payment.id, PaymentStatus::Succeeded)
            .await
            .unwrap();
        assert_eq!(paid.status, PaymentStatus::Succeeded);

        let again = transition(&mut conn, payment.id, PaymentStatus::Cancelled).await;
        assert!(matches!(again, Err(Error::Conflict(_))));
        assert_eq!(
            load(&mut conn, payment.id).await.unwrap().status,
            PaymentStatus::Succeeded
        );

        assert_eq!(list_for_user(&mut conn, user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_validation() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let user_id = user(&mut conn).await;

        assert!(matches!(
            create(&mut conn, user_id, input(0, "EUR")).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            create(&mut conn, user_id, input(100, "EURO")).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            create(
                &mut conn,
                user_id,
                PaymentInput {
                    book_id: Some(Uuid::new_v4()),
                    ..input(100, "USD")
                }
            )
            .await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            transition(&mut conn, Uuid::new_v4(), PaymentStatus::Failed).await,
            Err(Error::NotFound(_))
        ));
    }
}
