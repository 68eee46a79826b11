//! services/api/src/adapters/vault_store.rs
//!
//! File-backed implementation of the `VaultStore` port. One JSON blob per
//! user under `<data_dir>/vaults/<user_id>.json`, written atomically.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use minimalism_coach_core::crypto::EncryptedVault;
use minimalism_coach_core::ports::{PortError, PortResult, VaultStore};

use super::write_json_atomic;

pub struct FileVaultStore {
    dir: PathBuf,
}

impl FileVaultStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("vaults"),
        }
    }

    fn blob_path(&self, user_id: Uuid) -> PathBuf {
        self.dir.join(format!("{user_id}.json"))
    }
}

#[async_trait]
impl VaultStore for FileVaultStore {
    async fn read(&self, user_id: Uuid) -> PortResult<Option<EncryptedVault>> {
        let path = self.blob_path(user_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                PortError::Unexpected(format!("vault blob {:?} is corrupt: {e}", path))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortError::Unexpected(format!(
                "failed to read {:?}: {e}",
                path
            ))),
        }
    }

    async fn write(&self, user_id: Uuid, blob: &EncryptedVault) -> PortResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PortError::Unexpected(format!("create {:?}: {e}", self.dir)))?;
        write_json_atomic(&self.blob_path(user_id), blob).await
    }

    async fn delete(&self, user_id: Uuid) -> PortResult<()> {
        let path = self.blob_path(user_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(format!(
                "failed to delete {:?}: {e}",
                path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_blob() -> EncryptedVault {
        EncryptedVault {
            version: 1,
            algorithm: "aes-256-gcm".to_string(),
            iv: "aXYtYnl0ZXMtaGVyZQ==".to_string(),
            auth_tag: "dGFnLWJ5dGVzLWhlcmUtMTY=".to_string(),
            ciphertext: "Y2lwaGVydGV4dA==".to_string(),
            updated_at: Utc::now(),
            iterations: 120_000,
        }
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVaultStore::new(dir.path());
        let user_id = Uuid::new_v4();

        let blob = sample_blob();
        store.write(user_id, &blob).await.unwrap();

        let read_back = store.read(user_id).await.unwrap().unwrap();
        assert_eq!(read_back, blob);
    }

    #[tokio::test]
    async fn missing_blob_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVaultStore::new(dir.path());
        assert!(store.read(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_the_blob_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVaultStore::new(dir.path());
        let user_id = Uuid::new_v4();

        store.write(user_id, &sample_blob()).await.unwrap();
        store.delete(user_id).await.unwrap();
        assert!(store.read(user_id).await.unwrap().is_none());

        // Deleting again is not an error.
        store.delete(user_id).await.unwrap();
    }

    #[tokio::test]
    async fn blobs_are_isolated_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVaultStore::new(dir.path());
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let mut blob = sample_blob();
        store.write(first, &blob).await.unwrap();
        blob.iterations = 1_000;
        store.write(second, &blob).await.unwrap();

        assert_eq!(store.read(first).await.unwrap().unwrap().iterations, 120_000);
        assert_eq!(store.read(second).await.unwrap().unwrap().iterations, 1_000);
    }
}
