//! Comment endpoints

use axum::{
    extract::State,
    routing::{delete, get},
    Router,
};
use uuid::Uuid;

use super::auth::AuthUser;
use super::extract::{JsonBody, PathParams};
use super::response::ApiResponse;
use crate::db::books;
use crate::db::comments::{self, Comment, CommentInput};
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/books/:id/comments
pub async fn list_comments(
    State(state): State<AppState>,
    PathParams(book_id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Vec<Comment>>> {
    let mut conn = state.db.acquire().await?;
    books::load(&mut conn, book_id).await?;
    let found = comments::list_for_book(&mut conn, book_id).await?;
    Ok(ApiResponse::ok(format!("{} comments", found.len()), found))
}

/// POST /api/books/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(book_id): PathParams<Uuid>,
    JsonBody(input): JsonBody<CommentInput>,
) -> ApiResult<ApiResponse<Comment>> {
    let mut tx = state.db.begin().await?;
    let comment = comments::create(&mut tx, book_id, auth.id(), input).await?;
    tx.commit().await?;
    Ok(ApiResponse::created("Comment added", comment))
}

/// DELETE /api/comments/:id (comment author or admin)
pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Uuid>> {
    let mut conn = state.db.acquire().await?;
    let comment = comments::load(&mut conn, id).await?;
    auth.require_self_or_admin(comment.user_id)?;
    drop(conn);

    let mut tx = state.db.begin().await?;
    comments::delete(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::ok("Comment deleted", id))
}

pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/books/:id/comments", get(list_comments).post(create_comment))
        .route("/api/comments/:id", delete(delete_comment))
}
