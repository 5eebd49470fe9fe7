//! Author endpoints

use axum::{extract::State, routing::get, Router};
use uuid::Uuid;

use super::auth::AuthUser;
use super::extract::{JsonBody, PathParams};
use super::response::ApiResponse;
use crate::db::authors::{self, Author, AuthorInput};
use crate::db::books::{self, Book};
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/authors
pub async fn list_authors(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<Author>>> {
    let mut conn = state.db.acquire().await?;
    let all = authors::list(&mut conn).await?;
    Ok(ApiResponse::ok(format!("{} authors", all.len()), all))
}

/// GET /api/authors/:id
pub async fn get_author(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Author>> {
    let mut conn = state.db.acquire().await?;
    Ok(ApiResponse::ok("Author found", authors::load(&mut conn, id).await?))
}

/// GET /api/authors/:id/books
pub async fn list_author_books(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Vec<Book>>> {
    let mut conn = state.db.acquire().await?;
    authors::load(&mut conn, id).await?;
    let found = books::list_by_author(&mut conn, id).await?;
    Ok(ApiResponse::ok(format!("{} books", found.len()), found))
}

/// POST /api/authors
pub async fn create_author(
    State(state): State<AppState>,
    _auth: AuthUser,
    JsonBody(input): JsonBody<AuthorInput>,
) -> ApiResult<ApiResponse<Author>> {
    let mut conn = state.db.acquire().await?;
    let author = authors::create(&mut conn, input).await?;
    Ok(ApiResponse::created("Author created", author))
}

/// PUT /api/authors/:id
pub async fn update_author(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
    JsonBody(input): JsonBody<AuthorInput>,
) -> ApiResult<ApiResponse<Author>> {
    let mut conn = state.db.acquire().await?;
    let author = authors::update(&mut conn, id, input).await?;
    Ok(ApiResponse::ok("Author updated", author))
}

/// DELETE /api/authors/:id (admin)
pub async fn delete_author(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Uuid>> {
    auth.require_admin()?;
    let mut conn = state.db.acquire().await?;
    authors::delete(&mut conn, id).await?;
    Ok(ApiResponse::ok("Author deleted", id))
}

pub fn author_routes() -> Router<AppState> {
    Router::new()
        .route("/api/authors", get(list_authors).post(create_author))
        .route(
            "/api/authors/:id",
            get(get_author).put(update_author).delete(delete_author),
        )
        .route("/api/authors/:id/books", get(list_author_books))
}
