//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;
use minimalism_coach_core::domain::Role;

/// The authenticated caller, inserted into request extensions by
/// [`require_auth`] or [`attach_user_if_present`].
///
/// Carries the raw token so logout can revoke exactly the credential that was
/// presented.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub token: String,
}

/// Pulls the bearer token out of the Authorization header, if any.
fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Middleware that validates the bearer token and extracts the caller.
///
/// If valid, inserts an [`AuthUser`] into request extensions for handlers to
/// use. If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req).ok_or(ApiError::Unauthorized)?;
    let claims = state.tokens.verify(&token)?;

    req.extensions_mut().insert(AuthUser {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        token,
    });

    Ok(next.run(req).await)
}

/// Middleware for routes that work both anonymously and signed in (chat and
/// the WebSocket). A valid token attaches the caller; anything else leaves
/// the request anonymous rather than failing it.
pub async fn attach_user_if_present(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&req) {
        if let Ok(claims) = state.tokens.verify(&token) {
            req.extensions_mut().insert(AuthUser {
                id: claims.sub,
                email: claims.email,
                role: claims.role,
                token,
            });
        }
    }
    next.run(req).await
}

/// Middleware that rejects non-admin callers. Must be layered inside
/// [`require_auth`] so the extension is already present.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let is_admin = req
        .extensions()
        .get::<AuthUser>()
        .is_some_and(|user| user.role == Role::Admin);
    if !is_admin {
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(req).await)
}
