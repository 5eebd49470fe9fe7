//! Publisher endpoints

use axum::{extract::State, routing::get, Router};
use uuid::Uuid;

use super::auth::AuthUser;
use super::extract::{JsonBody, PathParams};
use super::response::ApiResponse;
use crate::db::publishers::{self, Publisher, PublisherInput};
use crate::error::ApiResult;
use crate::AppState;

pub async fn list_publishers(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<Vec<Publisher>>> {
    let mut conn = state.db.acquire().await?;
    let all = publishers::list(&mut conn).await?;
    Ok(ApiResponse::ok(format!("{} publishers", all.len()), all))
}

pub async fn get_publisher(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Publisher>> {
    let mut conn = state.db.acquire().await?;
    Ok(ApiResponse::ok("Publisher found", publishers::load(&mut conn, id).await?))
}

pub async fn create_publisher(
    State(state): State<AppState>,
    _auth: AuthUser,
    JsonBody(input): JsonBody<PublisherInput>,
) -> ApiResult<ApiResponse<Publisher>> {
    let mut conn = state.db.acquire().await?;
    let publisher = publishers::create(&mut conn, input).await?;
    Ok(ApiResponse::created("Publisher created", publisher))
}

pub async fn update_publisher(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
    JsonBody(input): JsonBody<PublisherInput>,
) -> ApiResult<ApiResponse<Publisher>> {
    let mut conn = state.db.acquire().await?;
    let publisher = publishers::update(&mut conn, id, input).await?;
    Ok(ApiResponse::ok("Publisher updated", publisher))
}

pub async fn delete_publisher(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Uuid>> {
    auth.require_admin()?;
    let mut conn = state.db.acquire().await?;
    publishers::delete(&mut conn, id).await?;
    Ok(ApiResponse::ok("Publisher deleted", id))
}

pub fn publisher_routes() -> Router<AppState> {
    Router::new()
        .route("/api/publishers", get(list_publishers).post(create_publisher))
        .route(
            "/api/publishers/:id",
            get(get_publisher).put(update_publisher).delete(delete_publisher),
        )
}
