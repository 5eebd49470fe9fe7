//! Publishing endpoints and moderation

use axum::{
    extract::State,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::auth::AuthUser;
use super::extract::{JsonBody, PathParams};
use super::response::ApiResponse;
use crate::db::publishings::{self, PublishingDetail};
use crate::db::Status;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: Status,
}

pub async fn list_publishings(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<Vec<PublishingDetail>>> {
    let mut conn = state.db.acquire().await?;
    let all = publishings::list(&mut conn).await?;
    Ok(ApiResponse::ok(format!("{} publishings", all.len()), all))
}

pub async fn get_publishing(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<PublishingDetail>> {
    let mut conn = state.db.acquire().await?;
    Ok(ApiResponse::ok("Publishing found", publishings::load(&mut conn, id).await?))
}

/// PUT /api/publishings/:id/status (admin)
pub async fn moderate_publishing(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
    JsonBody(change): JsonBody<StatusChange>,
) -> ApiResult<ApiResponse<PublishingDetail>> {
    auth.require_admin()?;

    let mut conn = state.db.acquire().await?;
    let publishing = publishings::set_status(&mut conn, id, change.status).await?;

    info!("Publishing {} is now {}", id, change.status.as_str());
    Ok(ApiResponse::ok("Publishing status updated", publishing))
}

pub fn publishing_routes() -> Router<AppState> {
    Router::new()
        .route("/api/publishings", get(list_publishings))
        .route("/api/publishings/:id", get(get_publishing))
        .route("/api/publishings/:id/status", put(moderate_publishing))
}
