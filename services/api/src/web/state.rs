//! services/api/src/web/state.rs
//!
//! Defines the application's shared state: service ports, the token manager,
//! and the in-memory caches that exist only for the lifetime of the process.

use crate::auth::TokenManager;
use crate::config::Config;
use crate::error::ApiError;
use crate::vault::VaultService;
use crate::web::middleware::AuthUser;
use minimalism_coach_core::crypto::EncryptionKey;
use minimalism_coach_core::domain::{Profile, Progress, VaultDocument};
use minimalism_coach_core::ports::{CoachModelService, CredentialStore};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub users: Arc<dyn CredentialStore>,
    pub vaults: VaultService,
    pub coach: Arc<dyn CoachModelService>,
    pub tokens: TokenManager,
    pub config: Arc<Config>,
    /// Server-side vault keys, held only while a session is live.
    pub keys: KeyCache,
    /// Compact last-exchange summaries, keyed by session.
    pub session_contexts: SessionContextCache,
    /// Plaintext profile/progress snapshots for the admin summary. Populated
    /// opportunistically as users touch their vaults; empty after a restart.
    pub profiles: SnapshotCache<Profile>,
    pub progress: SnapshotCache<Progress>,
    pub chat_limiter: RateLimiter,
}

impl AppState {
    /// Resolves the caller's cached vault key and loads their document.
    ///
    /// A missing key means the process restarted (or the user logged out)
    /// since the token was issued; the caller has to log in again because the
    /// key only ever exists in memory.
    pub async fn vault_for_request(
        &self,
        user: &AuthUser,
    ) -> Result<(VaultDocument, EncryptionKey), ApiError> {
        let key = self
            .keys
            .resolve(user.id)
            .await
            .ok_or(ApiError::ReauthenticationRequired)?;
        let vault = self.vaults.load(user.id, &key).await?;
        Ok((vault, key))
    }

    /// Refreshes the admin-summary snapshots from a vault document.
    pub async fn refresh_snapshots(&self, user_id: Uuid, vault: &VaultDocument) {
        if let Some(profile) = &vault.profile {
            self.profiles.set(user_id, profile.clone()).await;
        }
        self.progress.set(user_id, vault.progress.clone()).await;
    }

    /// Drops every per-user cache entry. Called on logout and account deletion.
    pub async fn forget_user(&self, user_id: Uuid) {
        self.keys.clear(user_id).await;
        self.session_contexts.clear(&user_id.to_string()).await;
        self.profiles.remove(user_id).await;
        self.progress.remove(user_id).await;
    }
}

//=========================================================================================
// Key Cache
//=========================================================================================

/// Holds derived vault keys for live sessions. Keys never touch disk; a
/// restart empties the cache and forces re-login.
#[derive(Default)]
pub struct KeyCache {
    keys: RwLock<HashMap<Uuid, EncryptionKey>>,
}

impl KeyCache {
    pub async fn cache(&self, user_id: Uuid, key: EncryptionKey) {
        self.keys.write().await.insert(user_id, key);
    }

    pub async fn resolve(&self, user_id: Uuid) -> Option<EncryptionKey> {
        self.keys.read().await.get(&user_id).cloned()
    }

    pub async fn clear(&self, user_id: Uuid) {
        self.keys.write().await.remove(&user_id);
    }
}

//=========================================================================================
// Session Context Cache
//=========================================================================================

/// The last exchange of a session, kept to give the model a sliver of
/// continuity without re-sending history on every request.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub last_user: String,
    pub last_reply: String,
}

impl SessionContext {
    pub fn summary(&self) -> String {
        format!(
            "Previous exchange - User: {} | Coach: {}",
            self.last_user, self.last_reply
        )
    }
}

#[derive(Default)]
pub struct SessionContextCache {
    contexts: RwLock<HashMap<String, SessionContext>>,
}

impl SessionContextCache {
    /// Records the latest exchange, truncated so the cache stays small.
    pub async fn update(&self, session_key: &str, user_message: &str, reply: &str) {
        let context = SessionContext {
            last_user: truncate_chars(user_message, 100),
            last_reply: truncate_chars(reply, 100),
        };
        self.contexts
            .write()
            .await
            .insert(session_key.to_string(), context);
    }

    pub async fn summary(&self, session_key: &str) -> Option<String> {
        self.contexts
            .read()
            .await
            .get(session_key)
            .map(SessionContext::summary)
    }

    pub async fn clear(&self, session_key: &str) {
        self.contexts.write().await.remove(session_key);
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

//=========================================================================================
// Snapshot Cache
//=========================================================================================

/// A per-user snapshot of one vault sub-document, used only for the admin
/// summary. Best effort: never consulted for anything user-facing.
pub struct SnapshotCache<T> {
    entries: RwLock<HashMap<Uuid, T>>,
}

impl<T> Default for SnapshotCache<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Clone> SnapshotCache<T> {
    pub async fn set(&self, user_id: Uuid, value: T) {
        self.entries.write().await.insert(user_id, value);
    }

    pub async fn remove(&self, user_id: Uuid) {
        self.entries.write().await.remove(&user_id);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn values(&self) -> Vec<T> {
        self.entries.read().await.values().cloned().collect()
    }
}

//=========================================================================================
// Rate Limiter
//=========================================================================================

/// Rolling-window request counter, keyed by caller identity.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Records a hit for `key` and reports whether it is within the limit.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());

        let window = self.window;
        hits.retain(|_, timestamps| {
            while timestamps
                .front()
                .is_some_and(|t| now.duration_since(*t) > window)
            {
                timestamps.pop_front();
            }
            !timestamps.is_empty()
        });

        let timestamps = hits.entry(key.to_string()).or_default();
        if timestamps.len() >= self.max_requests as usize {
            return false;
        }
        timestamps.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_enforces_the_window_cap() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check("ada"));
        assert!(limiter.check("ada"));
        assert!(limiter.check("ada"));
        assert!(!limiter.check("ada"));
        // Separate keys have separate budgets.
        assert!(limiter.check("grace"));
    }

    #[tokio::test]
    async fn session_context_truncates_both_sides() {
        let cache = SessionContextCache::default();
        cache
            .update("session-1", &"u".repeat(500), &"a".repeat(500))
            .await;
        let summary = cache.summary("session-1").await.unwrap();
        assert!(summary.len() < 300);
        assert!(summary.starts_with("Previous exchange - User: uuu"));
    }

    #[tokio::test]
    async fn key_cache_round_trip_and_clear() {
        use minimalism_coach_core::crypto::EncryptionKey;
        let cache = KeyCache::default();
        let user_id = Uuid::new_v4();
        cache.cache(user_id, EncryptionKey::from_bytes([7u8; 32])).await;
        assert!(cache.resolve(user_id).await.is_some());
        cache.clear(user_id).await;
        assert!(cache.resolve(user_id).await.is_none());
    }
}
