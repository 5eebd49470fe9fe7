//! Book endpoints: catalogue, ingestion, covers and genre tags

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::auth::AuthUser;
use super::extract::{JsonBody, PathParams, QueryParams};
use super::response::ApiResponse;
use crate::db::books::{self, Book, BookAggregate, BookUpdate};
use crate::db::covers::{self, Cover};
use crate::db::{genres, Status};
use crate::error::ApiResult;
use crate::services::book_ingestion::{create_book_entities, CreateBookInput};
use crate::storage::{content_type_for, UploadKind, UploadPayload};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BookFilter {
    pub status: Option<Status>,
}

/// GET /api/books[?status=waiting|accepted|refused]
pub async fn list_books(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<BookFilter>,
) -> ApiResult<ApiResponse<Vec<Book>>> {
    let mut conn = state.db.acquire().await?;
    let found = books::list(&mut conn, filter.status).await?;
    Ok(ApiResponse::ok(format!("{} books", found.len()), found))
}

/// GET /api/books/:id
pub async fn get_book(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<BookAggregate>> {
    let mut conn = state.db.acquire().await?;
    let book = books::load_aggregate(&mut conn, id).await?;
    Ok(ApiResponse::ok("Book found", book))
}

/// POST /api/books
pub async fn create_book(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(input): JsonBody<CreateBookInput>,
) -> ApiResult<ApiResponse<BookAggregate>> {
    let book = create_book_entities(
        &state.db,
        &state.storage,
        state.config.max_upload_bytes,
        input,
    )
    .await?;

    info!("{} created book {}", auth.0.username, book.book.id);
    Ok(ApiResponse::created("Book created", book))
}

/// PUT /api/books/:id
///
/// Changing the moderation status needs an administrator.
pub async fn update_book(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
    JsonBody(changes): JsonBody<BookUpdate>,
) -> ApiResult<ApiResponse<Book>> {
    if changes.status.is_some() {
        auth.require_admin()?;
    }

    let mut conn = state.db.acquire().await?;
    let book = books::update(&mut conn, id, changes).await?;
    Ok(ApiResponse::ok("Book updated", book))
}

/// DELETE /api/books/:id (admin)
pub async fn delete_book(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Uuid>> {
    auth.require_admin()?;

    let mut conn = state.db.acquire().await?;
    let cover_ids = books::delete(&mut conn, id).await?;
    drop(conn);

    for cover_id in cover_ids {
        if let Err(e) = state.storage.remove(UploadKind::Cover, cover_id).await {
            warn!("Failed to remove cover file {}: {}", cover_id, e);
        }
    }

    info!("Deleted book {}", id);
    Ok(ApiResponse::ok("Book deleted", id))
}

/// POST /api/books/:id/cover
///
/// Replaces any existing cover.
pub async fn upload_cover(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathParams(book_id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<UploadPayload>,
) -> ApiResult<ApiResponse<Cover>> {
    let upload = payload.decode(state.config.max_upload_bytes)?;
    let cover = Cover::new(upload.filename, book_id);

    state
        .storage
        .save(UploadKind::Cover, cover.id, &upload.bytes)
        .await?;

    let replaced = async {
        let mut tx = state.db.begin().await?;
        let previous = covers::replace(&mut tx, &cover).await?;
        tx.commit().await?;
        Ok::<_, calliope_common::Error>(previous)
    }
    .await;

    match replaced {
        Ok(previous) => {
            if let Some(old) = previous {
                if let Err(e) = state.storage.remove(UploadKind::Cover, old).await {
                    warn!("Failed to remove replaced cover file {}: {}", old, e);
                }
            }
            Ok(ApiResponse::created("Cover uploaded", cover))
        }
        Err(e) => {
            if let Err(cleanup) = state.storage.remove(UploadKind::Cover, cover.id).await {
                warn!("Failed to remove cover file {}: {}", cover.id, cleanup);
            }
            Err(e.into())
        }
    }
}

/// GET /api/books/:id/cover (image bytes)
pub async fn download_cover(
    State(state): State<AppState>,
    PathParams(book_id): PathParams<Uuid>,
) -> ApiResult<Response> {
    let mut conn = state.db.acquire().await?;
    let book = books::load(&mut conn, book_id).await?;
    let cover_id = book
        .cover_id
        .ok_or_else(|| calliope_common::Error::NotFound(format!("Book {} has no cover", book_id)))?;
    let cover = covers::load(&mut conn, cover_id).await?;
    drop(conn);

    let bytes = state.storage.read(UploadKind::Cover, cover.id).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&cover.filename))], bytes).into_response())
}

/// POST /api/books/:id/genres/:genre_id
pub async fn tag_book(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathParams((book_id, genre_id)): PathParams<(Uuid, Uuid)>,
) -> ApiResult<ApiResponse<BookAggregate>> {
    let mut conn = state.db.acquire().await?;
    books::load(&mut conn, book_id).await?;
    genres::load(&mut conn, genre_id).await?;
    genres::link_book(&mut conn, book_id, genre_id).await?;

    let book = books::load_aggregate(&mut conn, book_id).await?;
    Ok(ApiResponse::ok("Genre added", book))
}

/// DELETE /api/books/:id/genres/:genre_id
pub async fn untag_book(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathParams((book_id, genre_id)): PathParams<(Uuid, Uuid)>,
) -> ApiResult<ApiResponse<BookAggregate>> {
    let mut conn = state.db.acquire().await?;
    genres::unlink_book(&mut conn, book_id, genre_id).await?;

    let book = books::load_aggregate(&mut conn, book_id).await?;
    Ok(ApiResponse::ok("Genre removed", book))
}

pub fn book_routes() -> Router<AppState> {
    Router::new()
        .route("/api/books", get(list_books).post(create_book))
        .route(
            "/api/books/:id",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/api/books/:id/cover", post(upload_cover).get(download_cover))
        .route(
            "/api/books/:id/genres/:genre_id",
            post(tag_book).delete(untag_book),
        )
}
