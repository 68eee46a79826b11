//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user registration, login, and logout, plus
//! the blocking helpers that keep argon2 and PBKDF2 off the async runtime.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use minimalism_coach_core::crypto::{self, EncryptionKey};
use minimalism_coach_core::domain::{PublicUser, Role, UserRecord, VaultDocument};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
    pub vault: VaultDocument,
}

//=========================================================================================
// Validation & Credential Helpers
//=========================================================================================

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if email.is_empty() || !email_regex().is_match(email) {
        return Err(ApiError::Validation(
            "A valid email address is required.".to_string(),
        ));
    }
    if password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters long.".to_string(),
        ));
    }
    Ok(())
}

/// First registered user becomes an admin when no allowlist is configured;
/// otherwise only allowlisted emails do.
fn assign_role(email: &str, existing_users: usize, admin_emails: &[String]) -> Role {
    if admin_emails.iter().any(|admin| admin == email) {
        Role::Admin
    } else if existing_users == 0 && admin_emails.is_empty() {
        Role::Admin
    } else {
        Role::User
    }
}

/// Hashes a password with argon2 on a blocking thread.
pub(crate) async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::Internal(format!("failed to hash password: {e}")))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
}

/// Verifies a password against its stored argon2 hash on a blocking thread.
pub(crate) async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash)
            .map_err(|e| ApiError::Internal(format!("stored password hash is invalid: {e}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("verification task failed: {e}")))?
}

/// Derives the vault key on a blocking thread; the iteration count makes this
/// far too slow for the async runtime.
pub(crate) async fn derive_vault_key(
    password: String,
    salt: String,
    iterations: u32,
) -> Result<EncryptionKey, ApiError> {
    tokio::task::spawn_blocking(move || Ok(crypto::derive_key(&password, &salt, iterations)?))
        .await
        .map_err(|e| ApiError::Internal(format!("key derivation task failed: {e}")))?
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/register - Create a new account and open its vault
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; session token and vault returned"),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    validate_credentials(&email, &req.password)?;
    let display_name = req
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::DuplicateEmail);
    }

    let password_hash = hash_password(req.password.clone()).await?;
    let encryption_salt = crypto::generate_salt();
    let key = derive_vault_key(
        req.password,
        encryption_salt.clone(),
        state.config.pbkdf2_iterations,
    )
    .await?;

    let role = assign_role(
        &email,
        state.users.count_users().await?,
        &state.config.admin_emails,
    );

    let record = UserRecord {
        id: Uuid::new_v4(),
        email,
        password_hash,
        encryption_salt,
        role,
        created_at: Utc::now(),
        last_login_at: Some(Utc::now()),
        display_name: display_name.clone(),
    };
    state.users.insert_user(record.clone()).await?;

    let vault = state
        .vaults
        .ensure(record.id, display_name.as_deref(), &key)
        .await?;
    state.refresh_snapshots(record.id, &vault).await;
    state.keys.cache(record.id, key).await;

    let token = state.tokens.issue(&record)?;
    info!(user_id = %record.id, "registered new account");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: record.sanitized(),
            vault,
        }),
    ))
}

/// POST /api/login - Authenticate and unlock the vault
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; session token and vault returned"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();

    let mut record = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let valid = verify_password(req.password.clone(), record.password_hash.clone()).await?;
    if !valid {
        return Err(ApiError::InvalidCredentials);
    }

    // A record without a salt predates vault encryption and needs an explicit
    // migration; deriving from it would silently produce a bogus key.
    let key = derive_vault_key(
        req.password,
        record.encryption_salt.clone(),
        state.config.pbkdf2_iterations,
    )
    .await?;

    let vault = state
        .vaults
        .ensure(record.id, record.display_name.as_deref(), &key)
        .await?;
    state.refresh_snapshots(record.id, &vault).await;
    state.keys.cache(record.id, key).await;

    record.last_login_at = Some(Utc::now());
    state.users.update_user(record.clone()).await?;

    let token = state.tokens.issue(&record)?;
    info!(user_id = %record.id, "login successful");

    Ok(Json(AuthResponse {
        token,
        user: record.sanitized(),
        vault,
    }))
}

/// POST /api/logout - Revoke the session and drop the cached vault key
#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 200, description = "Session revoked"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    state.tokens.revoke(&user.token);
    state.forget_user(user.id).await;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_assignment_prefers_the_allowlist() {
        let allowlist = vec!["boss@example.com".to_string()];
        assert_eq!(assign_role("boss@example.com", 5, &allowlist), Role::Admin);
        assert_eq!(assign_role("ada@example.com", 0, &allowlist), Role::User);
    }

    #[test]
    fn first_user_is_admin_only_without_an_allowlist() {
        assert_eq!(assign_role("ada@example.com", 0, &[]), Role::Admin);
        assert_eq!(assign_role("grace@example.com", 1, &[]), Role::User);
    }

    #[test]
    fn credential_validation_rejects_bad_input() {
        assert!(validate_credentials("not-an-email", "password123").is_err());
        assert!(validate_credentials("", "password123").is_err());
        assert!(validate_credentials("ada@example.com", "short").is_err());
        assert!(validate_credentials("ada@example.com", "password123").is_ok());
    }
}
