//! calliope-api library - library catalogue REST service

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{middleware, Router};
use calliope_common::config::ServiceConfig;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod seed;
pub mod services;
pub mod storage;

pub use error::{ApiError, ApiResult};
use storage::UploadStorage;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Cover and avatar files
    pub storage: UploadStorage,
    /// Bearer token signing secret
    pub token_secret: i64,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        storage: UploadStorage,
        token_secret: i64,
        config: ServiceConfig,
    ) -> Self {
        Self {
            db,
            storage,
            token_secret,
            config: Arc::new(config),
        }
    }
}

/// Request bodies carry base64 uploads, a third larger than the decoded limit
fn body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes / 3 * 4 + 64 * 1024
}

/// Build application router
///
/// Every route sees the auth middleware; handlers that need a caller take an
/// [`api::AuthUser`].
pub fn build_router(state: AppState) -> Router {
    let limit = body_limit(state.config.max_upload_bytes);

    Router::new()
        .merge(api::health_routes())
        .merge(api::user_routes())
        .merge(api::book_routes())
        .merge(api::comment_routes())
        .merge(api::author_routes())
        .merge(api::publisher_routes())
        .merge(api::genre_routes())
        .merge(api::format_routes())
        .merge(api::publishing_routes())
        .merge(api::payment_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
