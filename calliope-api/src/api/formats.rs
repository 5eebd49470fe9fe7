//! Format endpoints

use axum::{extract::State, routing::get, Router};
use uuid::Uuid;

use super::auth::AuthUser;
use super::extract::{JsonBody, PathParams};
use super::response::ApiResponse;
use crate::db::formats::{self, Format, FormatInput};
use crate::error::ApiResult;
use crate::services::record_factory::{default_format, FormatOverrides, NewFormat};
use crate::AppState;

fn new_format(input: FormatInput) -> NewFormat {
    default_format(FormatOverrides {
        format_type: Some(input.format_type.trim().to_string()),
        language: input
            .language
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
    })
}

pub async fn list_formats(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<Format>>> {
    let mut conn = state.db.acquire().await?;
    let all = formats::list(&mut conn).await?;
    Ok(ApiResponse::ok(format!("{} formats", all.len()), all))
}

pub async fn get_format(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Format>> {
    let mut conn = state.db.acquire().await?;
    Ok(ApiResponse::ok("Format found", formats::load(&mut conn, id).await?))
}

pub async fn create_format(
    State(state): State<AppState>,
    _auth: AuthUser,
    JsonBody(input): JsonBody<FormatInput>,
) -> ApiResult<ApiResponse<Format>> {
    let mut conn = state.db.acquire().await?;
    let format = formats::insert(&mut conn, &new_format(input)).await?;
    Ok(ApiResponse::created("Format created", format))
}

pub async fn update_format(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
    JsonBody(input): JsonBody<FormatInput>,
) -> ApiResult<ApiResponse<Format>> {
    let mut conn = state.db.acquire().await?;
    let format = formats::update(&mut conn, id, &new_format(input)).await?;
    Ok(ApiResponse::ok("Format updated", format))
}

pub async fn delete_format(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Uuid>> {
    auth.require_admin()?;
    let mut conn = state.db.acquire().await?;
    formats::delete(&mut conn, id).await?;
    Ok(ApiResponse::ok("Format deleted", id))
}

pub fn format_routes() -> Router<AppState> {
    Router::new()
        .route("/api/formats", get(list_formats).post(create_format))
        .route(
            "/api/formats/:id",
            get(get_format).put(update_format).delete(delete_format),
        )
}
