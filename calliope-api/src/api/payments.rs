//! Payment endpoints
//!
//! Payments are bookkeeping only; no provider is contacted. The owner or an
//! administrator settles a pending payment through confirm, cancel or fail.

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::info;
use uuid::Uuid;

use super::auth::AuthUser;
use super::extract::{JsonBody, PathParams};
use super::response::ApiResponse;
use crate::db::payments::{self, Payment, PaymentInput, PaymentStatus};
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/payments
///
/// Administrators see every payment, other users their own.
pub async fn list_payments(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<Vec<Payment>>> {
    let mut conn = state.db.acquire().await?;
    let found = if auth.is_admin() {
        payments::list(&mut conn).await?
    } else {
        payments::list_for_user(&mut conn, auth.id()).await?
    };
    Ok(ApiResponse::ok(format!("{} payments", found.len()), found))
}

pub async fn get_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Payment>> {
    let mut conn = state.db.acquire().await?;
    let payment = payments::load(&mut conn, id).await?;
    auth.require_self_or_admin(payment.user_id)?;
    Ok(ApiResponse::ok("Payment found", payment))
}

pub async fn create_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(input): JsonBody<PaymentInput>,
) -> ApiResult<ApiResponse<Payment>> {
    let mut conn = state.db.acquire().await?;
    let payment = payments::create(&mut conn, auth.id(), input).await?;

    info!(
        "Payment {} opened: {} {} cents",
        payment.reference, payment.currency, payment.amount_cents
    );
    Ok(ApiResponse::created("Payment created", payment))
}

async fn settle(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
    to: PaymentStatus,
) -> ApiResult<Payment> {
    let mut conn = state.db.acquire().await?;
    let payment = payments::load(&mut conn, id).await?;
    auth.require_self_or_admin(payment.user_id)?;

    let settled = payments::transition(&mut conn, id, to).await?;
    info!("Payment {} {}", settled.reference, to.as_str());
    Ok(settled)
}

/// POST /api/payments/:id/confirm
pub async fn confirm_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Payment>> {
    let payment = settle(&state, &auth, id, PaymentStatus::Succeeded).await?;
    Ok(ApiResponse::ok("Payment confirmed", payment))
}

/// POST /api/payments/:id/cancel
pub async fn cancel_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Payment>> {
    let payment = settle(&state, &auth, id, PaymentStatus::Cancelled).await?;
    Ok(ApiResponse::ok("Payment cancelled", payment))
}

/// POST /api/payments/:id/fail
pub async fn fail_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Payment>> {
    let payment = settle(&state, &auth, id, PaymentStatus::Failed).await?;
    Ok(ApiResponse::ok("Payment marked failed", payment))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/payments", get(list_payments).post(create_payment))
        .route("/api/payments/:id", get(get_payment))
        .route("/api/payments/:id/confirm", post(confirm_payment))
        .route("/api/payments/:id/cancel", post(cancel_payment))
        .route("/api/payments/:id/fail", post(fail_payment))
}
