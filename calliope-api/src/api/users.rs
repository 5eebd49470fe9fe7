//! Accounts: registration, login, profile and avatar

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use calliope_common::auth::{issue_token, Claims};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::auth::AuthUser;
use super::extract::{JsonBody, PathParams};
use super::response::ApiResponse;
use crate::db::avatars::{self, Avatar};
use crate::db::users::{self, Enrollment, Registration, User};
use crate::error::ApiResult;
use crate::storage::{content_type_for, UploadKind, UploadPayload};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token plus the account it was issued for
#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
    pub user: User,
}

fn open_session(state: &AppState, user: User) -> ApiResult<Session> {
    let claims = Claims::new(
        user.id,
        user.username.clone(),
        user.role,
        Utc::now().timestamp(),
        state.config.token_ttl_secs,
    );
    let token = issue_token(&claims, state.token_secret)?;

    Ok(Session {
        token,
        expires_at: claims.exp,
        user,
    })
}

/// POST /api/auth/register
///
/// The first account ever registered becomes an administrator.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(registration): JsonBody<Registration>,
) -> ApiResult<ApiResponse<Session>> {
    let mut conn = state.db.acquire().await?;
    let user = users::register(&mut conn, registration, Enrollment::FirstIsAdmin).await?;
    drop(conn);

    info!("Registered user {} as {}", user.username, user.role.as_str());
    Ok(ApiResponse::created("User registered", open_session(&state, user)?))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<ApiResponse<Session>> {
    let mut conn = state.db.acquire().await?;
    let user = users::authenticate(&mut conn, &request.username, &request.password).await?;
    drop(conn);

    Ok(ApiResponse::ok("Logged in", open_session(&state, user)?))
}

/// GET /api/users/me
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<ApiResponse<User>> {
    let mut conn = state.db.acquire().await?;
    let user = users::load(&mut conn, auth.id()).await?;
    Ok(ApiResponse::ok("Current user", user))
}

/// GET /api/users (admin)
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<Vec<User>>> {
    auth.require_admin()?;
    let mut conn = state.db.acquire().await?;
    let all = users::list(&mut conn).await?;
    Ok(ApiResponse::ok(format!("{} users", all.len()), all))
}

/// DELETE /api/users/:id (self or admin)
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParams(id): PathParams<Uuid>,
) -> ApiResult<ApiResponse<Uuid>> {
    auth.require_self_or_admin(id)?;
    remove_user(&state, id).await
}

/// DELETE /api/users/me
pub async fn delete_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<ApiResponse<Uuid>> {
    remove_user(&state, auth.id()).await
}

async fn remove_user(state: &AppState, id: Uuid) -> ApiResult<ApiResponse<Uuid>> {
    let mut conn = state.db.acquire().await?;
    let avatar_ids = avatars::ids_for_user(&mut conn, id).await?;
    users::delete(&mut conn, id).await?;
    drop(conn);

    for avatar_id in avatar_ids {
        if let Err(e) = state.storage.remove(UploadKind::Avatar, avatar_id).await {
            warn!("Failed to remove avatar file {}: {}", avatar_id, e);
        }
    }

    info!("Deleted user {}", id);
    Ok(ApiResponse::ok("User deleted", id))
}

/// POST /api/users/me/avatar
pub async fn upload_avatar(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(payload): JsonBody<UploadPayload>,
) -> ApiResult<ApiResponse<Avatar>> {
    let upload = payload.decode(state.config.max_upload_bytes)?;
    let avatar = Avatar::new(upload.filename, auth.id());

    state
        .storage
        .save(UploadKind::Avatar, avatar.id, &upload.bytes)
        .await?;

    let replaced = async {
        let mut tx = state.db.begin().await?;
        let previous = avatars::replace(&mut tx, &avatar).await?;
        tx.commit().await?;
        Ok::<_, calliope_common::Error>(previous)
    }
    .await;

    match replaced {
        Ok(previous) => {
            if let Some(old) = previous {
                if let Err(e) = state.storage.remove(UploadKind::Avatar, old).await {
                    warn!("Failed to remove replaced avatar file {}: {}", old, e);
                }
            }
            Ok(ApiResponse::created("Avatar uploaded", avatar))
        }
        Err(e) => {
            if let Err(cleanup) = state.storage.remove(UploadKind::Avatar, avatar.id).await {
                warn!("Failed to remove avatar file {}: {}", avatar.id, cleanup);
            }
            Err(e.into())
        }
    }
}

/// GET /api/users/:id/avatar (image bytes)
pub async fn download_avatar(
    State(state): State<AppState>,
    PathParams(user_id): PathParams<Uuid>,
) -> ApiResult<Response> {
    let mut conn = state.db.acquire().await?;
    let avatar = avatars::load_for_user(&mut conn, user_id).await?;
    drop(conn);

    let bytes = state.storage.read(UploadKind::Avatar, avatar.id).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&avatar.filename))], bytes).into_response())
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/users", get(list_users))
        .route("/api/users/me", get(me).delete(delete_me))
        .route("/api/users/me/avatar", post(upload_avatar))
        .route("/api/users/:id", delete(delete_user))
        .route("/api/users/:id/avatar", get(download_avatar))
}
