//! services/api/src/web/account.rs
//!
//! Authenticated account endpoints: vault read/write, export, conversation
//! clearing, and account deletion. Every handler here runs behind
//! `require_auth` and resolves the caller's cached vault key.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::auth::verify_password;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use minimalism_coach_core::domain::VaultDocument;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct VaultUpdateRequest {
    #[schema(value_type = Object)]
    pub vault: VaultDocument,
}

#[derive(Deserialize, ToSchema)]
pub struct DeleteAccountRequest {
    pub password: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/account/me - The caller's sanitized record plus their vault
#[utoipa::path(
    get,
    path = "/api/account/me",
    responses(
        (status = 200, description = "Account record and decrypted vault"),
        (status = 401, description = "Not authenticated or vault key not cached"),
        (status = 404, description = "Account no longer exists")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .users
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found.".to_string()))?;
    let (vault, _key) = state.vault_for_request(&user).await?;
    state.refresh_snapshots(user.id, &vault).await;

    Ok(Json(json!({ "user": record.sanitized(), "vault": vault })))
}

/// GET /api/account/vault - The caller's decrypted vault document
#[utoipa::path(
    get,
    path = "/api/account/vault",
    responses(
        (status = 200, description = "Decrypted vault document"),
        (status = 401, description = "Not authenticated or vault key not cached")
    )
)]
pub async fn get_vault_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let (vault, _key) = state.vault_for_request(&user).await?;
    state.refresh_snapshots(user.id, &vault).await;
    Ok(Json(json!({ "vault": vault })))
}

/// PUT /api/account/vault - Replace the vault document wholesale
///
/// Last writer wins: the payload replaces whatever is stored, with no merge
/// or version check. A payload over the size ceiling is rejected before the
/// stored blob is touched.
#[utoipa::path(
    put,
    path = "/api/account/vault",
    responses(
        (status = 200, description = "Vault persisted"),
        (status = 400, description = "Vault exceeds the size ceiling"),
        (status = 401, description = "Not authenticated or vault key not cached")
    )
)]
pub async fn put_vault_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<VaultUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let key = state
        .keys
        .resolve(user.id)
        .await
        .ok_or(ApiError::ReauthenticationRequired)?;

    let saved = state.vaults.save(user.id, &key, req.vault).await?;
    state.refresh_snapshots(user.id, &saved).await;

    Ok(Json(json!({ "success": true })))
}

/// POST /api/account/export - Download the vault in plaintext
#[utoipa::path(
    post,
    path = "/api/account/export",
    responses(
        (status = 200, description = "Plaintext JSON export as an attachment"),
        (status = 401, description = "Not authenticated or vault key not cached")
    )
)]
pub async fn export_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .users
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found.".to_string()))?;
    let key = state
        .keys
        .resolve(user.id)
        .await
        .ok_or(ApiError::ReauthenticationRequired)?;
    let vault = state.vaults.export(user.id, &key).await?;

    let body = json!({
        "generatedAt": Utc::now(),
        "user": record.sanitized(),
        "vault": vault,
    });

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"minimalism-vault-{}.json\"", user.id),
            ),
        ],
        Json(body),
    ))
}

/// DELETE /api/account/conversations - Clear chat history from the vault
#[utoipa::path(
    delete,
    path = "/api/account/conversations",
    responses(
        (status = 200, description = "Conversation history cleared"),
        (status = 401, description = "Not authenticated or vault key not cached")
    )
)]
pub async fn delete_conversations_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let key = state
        .keys
        .resolve(user.id)
        .await
        .ok_or(ApiError::ReauthenticationRequired)?;

    state
        .vaults
        .mutate(user.id, &key, |vault| {
            vault.conversation_history.clear();
        })
        .await?;
    state.session_contexts.clear(&user.id.to_string()).await;

    Ok(Json(json!({ "success": true })))
}

/// DELETE /api/account - Permanently delete the account and its vault
///
/// Requires the password again: a stolen token alone must not be enough to
/// destroy someone's data.
#[utoipa::path(
    delete,
    path = "/api/account",
    request_body = DeleteAccountRequest,
    responses(
        (status = 200, description = "Account and vault deleted"),
        (status = 401, description = "Not authenticated or wrong password")
    )
)]
pub async fn delete_account_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<DeleteAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password confirmation is required.".to_string(),
        ));
    }

    let record = state
        .users
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found.".to_string()))?;

    let valid = verify_password(req.password, record.password_hash.clone()).await?;
    if !valid {
        return Err(ApiError::InvalidCredentials);
    }

    state.vaults.delete(user.id).await?;
    state.users.remove_user(user.id).await?;
    state.tokens.revoke(&user.token);
    state.forget_user(user.id).await;
    info!(user_id = %user.id, "account deleted");

    Ok(Json(json!({ "success": true })))
}
