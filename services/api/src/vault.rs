//! services/api/src/vault.rs
//!
//! The vault service: the only component that moves vault documents between
//! their plaintext and encrypted forms. Everything above it works with
//! plaintext `VaultDocument`s; everything below it only ever sees blobs.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use minimalism_coach_core::crypto::{open_vault, seal_vault, EncryptionKey};
use minimalism_coach_core::domain::VaultDocument;
use minimalism_coach_core::ports::VaultStore;

use crate::error::ApiError;

#[derive(Clone)]
pub struct VaultService {
    store: Arc<dyn VaultStore>,
    max_vault_size_bytes: usize,
    history_limit: usize,
    iterations: u32,
}

impl VaultService {
    pub fn new(
        store: Arc<dyn VaultStore>,
        max_vault_size_bytes: usize,
        history_limit: usize,
        iterations: u32,
    ) -> Self {
        Self {
            store,
            max_vault_size_bytes,
            history_limit,
            iterations,
        }
    }

    /// Called at registration and login: loads the user's vault, creating and
    /// persisting a default document when no blob exists yet.
    ///
    /// A blob that exists but fails to decrypt is an error, not a reset. The
    /// stored data is never discarded or "repaired" on this path.
    pub async fn ensure(
        &self,
        user_id: Uuid,
        display_name: Option<&str>,
        key: &EncryptionKey,
    ) -> Result<VaultDocument, ApiError> {
        match self.store.read(user_id).await? {
            Some(blob) => Ok(open_vault(key, &blob)?),
            None => {
                info!(%user_id, "no vault blob found; creating a default vault");
                let document = VaultDocument::new(user_id, display_name);
                self.save(user_id, key, document).await
            }
        }
    }

    /// Loads the vault for an in-session request. A missing blob yields a
    /// fresh default document so handlers never deal with absence.
    pub async fn load(
        &self,
        user_id: Uuid,
        key: &EncryptionKey,
    ) -> Result<VaultDocument, ApiError> {
        match self.store.read(user_id).await? {
            Some(blob) => Ok(open_vault(key, &blob)?),
            None => {
                let document = VaultDocument::new(user_id, None);
                self.save(user_id, key, document).await
            }
        }
    }

    /// Truncates conversation history, seals, and persists the document.
    ///
    /// Sealing failures (including the size ceiling) surface before the store
    /// is touched, so the previously persisted blob stays intact.
    pub async fn save(
        &self,
        user_id: Uuid,
        key: &EncryptionKey,
        mut document: VaultDocument,
    ) -> Result<VaultDocument, ApiError> {
        let history_len = document.conversation_history.len();
        if history_len > self.history_limit {
            document
                .conversation_history
                .drain(..history_len - self.history_limit);
        }

        let blob = seal_vault(key, &document, self.max_vault_size_bytes, self.iterations)?;
        self.store.write(user_id, &blob).await?;
        Ok(document)
    }

    /// Loads the vault, applies `mutate`, and persists the result.
    pub async fn mutate<F>(
        &self,
        user_id: Uuid,
        key: &EncryptionKey,
        mutate: F,
    ) -> Result<VaultDocument, ApiError>
    where
        F: FnOnce(&mut VaultDocument),
    {
        let mut document = self.load(user_id, key).await?;
        mutate(&mut document);
        self.save(user_id, key, document).await
    }

    /// Loads the vault in plaintext for export. Does not persist anything.
    pub async fn export(
        &self,
        user_id: Uuid,
        key: &EncryptionKey,
    ) -> Result<VaultDocument, ApiError> {
        match self.store.read(user_id).await? {
            Some(blob) => Ok(open_vault(key, &blob)?),
            None => Ok(VaultDocument::new(user_id, None)),
        }
    }

    /// Removes the user's blob entirely.
    pub async fn delete(&self, user_id: Uuid) -> Result<(), ApiError> {
        self.store.delete(user_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FileVaultStore;
    use minimalism_coach_core::crypto::derive_key;
    use minimalism_coach_core::domain::ChatEntry;

    const TEST_ITERATIONS: u32 = 1_000;

    fn service(dir: &std::path::Path, max_bytes: usize, history_limit: usize) -> VaultService {
        VaultService::new(
            Arc::new(FileVaultStore::new(dir)),
            max_bytes,
            history_limit,
            TEST_ITERATIONS,
        )
    }

    fn test_key(password: &str) -> EncryptionKey {
        derive_key(password, "dGVzdC1zYWx0LWJ5dGVz", TEST_ITERATIONS).unwrap()
    }

    fn chat_entry(content: &str) -> ChatEntry {
        ChatEntry {
            role: "user".to_string(),
            content: content.to_string(),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn ensure_creates_and_persists_a_default_vault() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), 512_000, 200);
        let key = test_key("password123");
        let user_id = Uuid::new_v4();

        let created = service.ensure(user_id, Some("Ada"), &key).await.unwrap();
        assert_eq!(
            created.profile.as_ref().and_then(|p| p.name.clone()),
            Some("Ada".to_string())
        );

        // A second ensure reads the persisted blob back instead of recreating.
        let reloaded = service.ensure(user_id, None, &key).await.unwrap();
        assert_eq!(reloaded, created);
    }

    #[tokio::test]
    async fn ensure_with_wrong_key_fails_instead_of_resetting() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), 512_000, 200);
        let user_id = Uuid::new_v4();

        let original = service
            .ensure(user_id, Some("Ada"), &test_key("password123"))
            .await
            .unwrap();

        let err = service
            .ensure(user_id, None, &test_key("wrong-password"))
            .await;
        assert!(err.is_err());

        // The stored blob is untouched.
        let reloaded = service
            .ensure(user_id, None, &test_key("password123"))
            .await
            .unwrap();
        assert_eq!(reloaded, original);
    }

    #[tokio::test]
    async fn save_truncates_history_to_the_most_recent_entries() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), 512_000, 3);
        let key = test_key("password123");
        let user_id = Uuid::new_v4();

        let mut document = VaultDocument::new(user_id, None);
        for i in 0..10 {
            document.conversation_history.push(chat_entry(&format!("message {i}")));
        }

        let saved = service.save(user_id, &key, document).await.unwrap();
        assert_eq!(saved.conversation_history.len(), 3);
        assert_eq!(saved.conversation_history[0].content, "message 7");
        assert_eq!(saved.conversation_history[2].content, "message 9");
    }

    #[tokio::test]
    async fn oversized_save_fails_and_leaves_prior_blob_intact() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), 2_048, 200);
        let key = test_key("password123");
        let user_id = Uuid::new_v4();

        let original = service.ensure(user_id, Some("Ada"), &key).await.unwrap();

        let mut oversized = original.clone();
        oversized
            .conversation_history
            .push(chat_entry(&"x".repeat(8_192)));
        assert!(service.save(user_id, &key, oversized).await.is_err());

        let reloaded = service.load(user_id, &key).await.unwrap();
        assert_eq!(reloaded, original);
    }

    #[tokio::test]
    async fn mutate_round_trips_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), 512_000, 200);
        let key = test_key("password123");
        let user_id = Uuid::new_v4();
        service.ensure(user_id, None, &key).await.unwrap();

        service
            .mutate(user_id, &key, |doc| {
                doc.conversation_history.push(chat_entry("hello"));
            })
            .await
            .unwrap();

        let loaded = service.load(user_id, &key).await.unwrap();
        assert_eq!(loaded.conversation_history.len(), 1);
        assert_eq!(loaded.conversation_history[0].content, "hello");
    }

    #[tokio::test]
    async fn delete_removes_the_blob() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), 512_000, 200);
        let key = test_key("password123");
        let user_id = Uuid::new_v4();

        let mut document = VaultDocument::new(user_id, None);
        document.conversation_history.push(chat_entry("hello"));
        service.save(user_id, &key, document).await.unwrap();
        service.delete(user_id).await.unwrap();

        // A subsequent load sees a fresh default, not the old content.
        let loaded = service.load(user_id, &key).await.unwrap();
        assert!(loaded.conversation_history.is_empty());
    }
}
