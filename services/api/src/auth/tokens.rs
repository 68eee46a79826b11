//! services/api/src/auth/tokens.rs
//!
//! Bearer token issuing, verification, and revocation.
//!
//! Tokens are HS256 JWTs pinned to a fixed audience and issuer. Revocation is
//! an in-memory map from token string to its expiry; entries are pruned lazily
//! whenever the map is consulted, so a restart clears the set (and the cached
//! vault keys with it, forcing a fresh login anyway).

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use minimalism_coach_core::domain::{Role, UserRecord};

pub const TOKEN_AUDIENCE: &str = "minimalism-app";
pub const TOKEN_ISSUER: &str = "extreme-minimalism-ai-coach";

/// Why a token was rejected. All variants map to 401 at the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Your session has expired. Please log in again.")]
    Expired,
    #[error("This session has been logged out. Please log in again.")]
    Revoked,
    #[error("Invalid authentication token.")]
    Malformed,
    #[error("Failed to issue a session token: {0}")]
    Issue(String),
}

/// The claims embedded in every session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The user's id.
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies session tokens, and tracks revocations until they
/// would have expired on their own.
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    revoked: Mutex<HashMap<String, i64>>,
}

impl TokenManager {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.set_issuer(&[TOKEN_ISSUER]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::seconds(ttl_secs),
            revoked: Mutex::new(HashMap::new()),
        }
    }

    /// Issues a fresh token for the given user.
    pub fn issue(&self, user: &UserRecord) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            aud: TOKEN_AUDIENCE.to_string(),
            iss: TOKEN_ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Issue(e.to_string()))
    }

    /// Verifies a token's signature, expiry, audience, and issuer, and checks
    /// it has not been revoked.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        {
            let mut revoked = self.revoked.lock().unwrap_or_else(|e| e.into_inner());
            let now = Utc::now().timestamp();
            revoked.retain(|_, exp| *exp > now);
            if revoked.contains_key(token) {
                return Err(TokenError::Revoked);
            }
        }

        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })
    }

    /// Marks a token as revoked until its natural expiry.
    ///
    /// The token's own `exp` claim bounds how long the entry must be kept; if
    /// the token cannot be decoded the entry is kept for a full ttl instead.
    pub fn revoke(&self, token: &str) {
        let exp = decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.exp)
            .unwrap_or_else(|_| (Utc::now() + self.ttl).timestamp());

        let mut revoked = self.revoked.lock().unwrap_or_else(|e| e.into_inner());
        revoked.insert(token.to_string(), exp);
    }

    #[cfg(test)]
    fn revoked_len(&self) -> usize {
        self.revoked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            password_hash: "hash".to_string(),
            encryption_salt: "c2FsdA==".to_string(),
            role: Role::User,
            created_at: Utc::now(),
            last_login_at: None,
            display_name: Some("Ada".to_string()),
        }
    }

    #[test]
    fn issued_token_verifies_and_carries_identity() {
        let manager = TokenManager::new("test-secret", 3_600);
        let user = sample_user();
        let token = manager.issue(&user).unwrap();
        let claims = manager.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.aud, TOKEN_AUDIENCE);
        assert_eq!(claims.iss, TOKEN_ISSUER);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let manager = TokenManager::new("test-secret", 3_600);
        let other = TokenManager::new("different-secret", 3_600);
        let token = other.issue(&sample_user()).unwrap();
        assert!(matches!(manager.verify(&token), Err(TokenError::Malformed)));
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        // jsonwebtoken allows 60s leeway by default, so go well past it.
        let manager = TokenManager::new("test-secret", -120);
        let token = manager.issue(&sample_user()).unwrap();
        assert!(matches!(manager.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn revoked_token_is_rejected_until_expiry() {
        let manager = TokenManager::new("test-secret", 3_600);
        let token = manager.issue(&sample_user()).unwrap();
        manager.verify(&token).unwrap();
        manager.revoke(&token);
        assert!(matches!(manager.verify(&token), Err(TokenError::Revoked)));
    }

    #[test]
    fn stale_revocations_are_pruned() {
        let manager = TokenManager::new("test-secret", -120);
        let token = manager.issue(&sample_user()).unwrap();
        manager.revoke(&token);
        assert_eq!(manager.revoked_len(), 1);
        // Any verification pass prunes entries whose expiry has passed.
        let fresh_manager_token = manager.issue(&sample_user()).unwrap();
        let _ = manager.verify(&fresh_manager_token);
        assert_eq!(manager.revoked_len(), 0);
    }
}
