//! Bearer token authentication
//!
//! [`auth_middleware`] runs on every route. When a request carries an
//! `Authorization: Bearer` header the token must verify, and its claims are
//! stored in the request extensions. Requests without the header pass
//! through untouched; handlers that need a caller take an [`AuthUser`].

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use calliope_common::auth::{verify_token, Claims, Role};
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

/// Verify a bearer token if present and attach its claims
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = match request.headers().get(AUTHORIZATION) {
        Some(value) => value
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Malformed Authorization header".to_string()))?
            .to_string(),
        None => return Ok(next.run(request).await),
    };

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Expected a Bearer token".to_string()))?;

    let claims = verify_token(token, state.token_secret, Utc::now().timestamp()).map_err(|e| {
        warn!("Rejected token: {}", e);
        ApiError::Unauthorized(e.to_string())
    })?;

    debug!("Authenticated {} ({})", claims.username, claims.role.as_str());
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0.sub
    }

    pub fn is_admin(&self) -> bool {
        self.0.is_admin()
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.0.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Administrator role required".to_string()))
        }
    }

    /// Allow the owner of a resource or any administrator
    pub fn require_self_or_admin(&self, owner: Uuid) -> Result<(), ApiError> {
        if self.id() == owner || self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Not allowed to act on another user's data".to_string()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser(Claims::new(Uuid::new_v4(), "ada", role, 0, 60))
    }

    #[test]
    fn test_role_checks() {
        let plain = user(Role::User);
        assert!(plain.require_admin().is_err());
        assert!(plain.require_self_or_admin(plain.id()).is_ok());
        assert!(plain.require_self_or_admin(Uuid::new_v4()).is_err());

        let admin = user(Role::Admin);
        assert!(admin.require_admin().is_ok());
        assert!(admin.require_self_or_admin(Uuid::new_v4()).is_ok());
    }
}
