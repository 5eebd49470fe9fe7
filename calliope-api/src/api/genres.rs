//! Genre endpoints

use axum::{extract::State, routing::get, Router};
use uuid::Uuid;

use super::auth::AuthUser;
use super::extract::{JsonBody, PathParams};
use super::response::ApiResponse;
use crate::db::genres::{self, Genre, GenreInput};
use crate::error::ApiResult;
use crate::AppState;

pub async fn list_genres(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<Genre>>> {
    let mut conn = state.db.acquire().await?;
    let all = genres::list(&mut conn).await?;
    Ok(ApiResponse::ok(format!("{} genres", all.len()), all))
}

pub async fn get_genre(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Genre>> {
    let mut conn = state.db.acquire().await?;
    Ok(ApiResponse::ok("Genre found", genres::load(&mut conn, id).await?))
}

pub async fn create_genre(
    State(state): State<AppState>,
    _auth: AuthUser,
    JsonBody(input): JsonBody<GenreInput>,
) -> ApiResult<ApiResponse<Genre>> {
    let mut conn = state.db.acquire().await?;
    let genre = genres::create(&mut conn, input).await?;
    Ok(ApiResponse::created("Genre created", genre))
}

pub async fn update_genre(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
    JsonBody(input): JsonBody<GenreInput>,
) -> ApiResult<ApiResponse<Genre>> {
    let mut conn = state.db.acquire().await?;
    let genre = genres::update(&mut conn, id, input).await?;
    Ok(ApiResponse::ok("Genre updated", genre))
}

pub async fn delete_genre(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Uuid>> {
    auth.require_admin()?;
    let mut conn = state.db.acquire().await?;
    genres::delete(&mut conn, id).await?;
    Ok(ApiResponse::ok("Genre deleted", id))
}

pub fn genre_routes() -> Router<AppState> {
    Router::new()
        .route("/api/genres", get(list_genres).post(create_genre))
        .route(
            "/api/genres/:id",
            get(get_genre).put(update_genre).delete(delete_genre),
        )
}
