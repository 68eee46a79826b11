//! services/api/src/adapters/user_store.rs
//!
//! File-backed implementation of the `CredentialStore` port.
//!
//! The entire user list lives in a single `users.json` under the data
//! directory. Every mutation rewrites the file atomically (temp file plus
//! rename), and a mutex serializes read-modify-write cycles so two concurrent
//! registrations cannot drop each other's record.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use minimalism_coach_core::domain::UserRecord;
use minimalism_coach_core::ports::{CredentialStore, PortError, PortResult};

use super::write_json_atomic;

pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("users.json"),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> PortResult<Vec<UserRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                PortError::Unexpected(format!("users file {:?} is corrupt: {e}", self.path))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(PortError::Unexpected(format!(
                "failed to read {:?}: {e}",
                self.path
            ))),
        }
    }

    async fn save(&self, users: &[UserRecord]) -> PortResult<()> {
        write_json_atomic(&self.path, &users).await
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn list_users(&self) -> PortResult<Vec<UserRecord>> {
        self.load().await
    }

    async fn find_by_email(&self, email: &str) -> PortResult<Option<UserRecord>> {
        let users = self.load().await?;
        Ok(users
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    async fn find_by_id(&self, user_id: Uuid) -> PortResult<Option<UserRecord>> {
        let users = self.load().await?;
        Ok(users.into_iter().find(|u| u.id == user_id))
    }

    async fn insert_user(&self, record: UserRecord) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.load().await?;
        if users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&record.email))
        {
            return Err(PortError::AlreadyExists(record.email));
        }
        users.push(record);
        self.save(&users).await
    }

    async fn update_user(&self, record: UserRecord) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.load().await?;
        let slot = users
            .iter_mut()
            .find(|u| u.id == record.id)
            .ok_or_else(|| PortError::NotFound(format!("user {}", record.id)))?;
        *slot = record;
        self.save(&users).await
    }

    async fn remove_user(&self, user_id: Uuid) -> PortResult<Option<UserRecord>> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.load().await?;
        let position = users.iter().position(|u| u.id == user_id);
        let removed = position.map(|i| users.remove(i));
        if removed.is_some() {
            self.save(&users).await?;
        }
        Ok(removed)
    }

    async fn count_users(&self) -> PortResult<usize> {
        Ok(self.load().await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use minimalism_coach_core::domain::Role;

    fn sample_user(email: &str) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: "argon2-hash".to_string(),
            encryption_salt: "c2FsdA==".to_string(),
            role: Role::User,
            created_at: Utc::now(),
            last_login_at: None,
            display_name: None,
        }
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());

        let user = sample_user("ada@example.com");
        store.insert_user(user.clone()).await.unwrap();

        let found = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.email, "ada@example.com");
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn email_lookup_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        store
            .insert_user(sample_user("ada@example.com"))
            .await
            .unwrap();

        let found = store.find_by_email("ADA@Example.COM").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        store
            .insert_user(sample_user("ada@example.com"))
            .await
            .unwrap();

        let err = store
            .insert_user(sample_user("Ada@Example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::AlreadyExists(_)));
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_replaces_the_record_and_missing_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let mut user = sample_user("ada@example.com");
        store.insert_user(user.clone()).await.unwrap();

        user.last_login_at = Some(Utc::now());
        store.update_user(user.clone()).await.unwrap();
        let found = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(found.last_login_at.is_some());

        let err = store
            .update_user(sample_user("ghost@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_returns_the_record_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let user = sample_user("ada@example.com");
        store.insert_user(user.clone()).await.unwrap();

        let removed = store.remove_user(user.id).await.unwrap();
        assert_eq!(removed.map(|u| u.id), Some(user.id));
        assert_eq!(store.count_users().await.unwrap(), 0);

        let missing = store.remove_user(user.id).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn empty_store_reads_as_no_users() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        assert!(store.list_users().await.unwrap().is_empty());
        assert!(store
            .find_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_none());
    }
}
