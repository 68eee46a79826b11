//! crates/minimalism_coach_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like the
//! filesystem or a model-serving endpoint.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::coaching::GenerationSettings;
use crate::crypto::EncryptedVault;
use crate::domain::UserRecord;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Owns the flat list of registered users. The only component allowed to see
/// password hashes and encryption salts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn list_users(&self) -> PortResult<Vec<UserRecord>>;

    /// Case-insensitive email lookup.
    async fn find_by_email(&self, email: &str) -> PortResult<Option<UserRecord>>;

    async fn find_by_id(&self, user_id: Uuid) -> PortResult<Option<UserRecord>>;

    /// Fails with `AlreadyExists` if the email is taken (case-insensitive).
    async fn insert_user(&self, record: UserRecord) -> PortResult<()>;

    /// Replaces an existing record in full. Fails with `NotFound` if missing.
    async fn update_user(&self, record: UserRecord) -> PortResult<()>;

    /// Removes and returns the record, or `None` if it was already gone.
    async fn remove_user(&self, user_id: Uuid) -> PortResult<Option<UserRecord>>;

    async fn count_users(&self) -> PortResult<usize>;
}

/// Owns exactly one encrypted blob per user id.
///
/// Writes must be atomic from a reader's perspective. Concurrent writes for
/// the same user are last-writer-wins; no version counter is kept.
#[async_trait]
pub trait VaultStore: Send + Sync {
    async fn read(&self, user_id: Uuid) -> PortResult<Option<EncryptedVault>>;
    async fn write(&self, user_id: Uuid, blob: &EncryptedVault) -> PortResult<()>;
    async fn delete(&self, user_id: Uuid) -> PortResult<()>;
}

/// A finite, non-restartable sequence of generated text chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

/// The language model behind the coach. The vault layer only hands it a
/// prompt string and consumes text back; the model's internals are opaque.
#[async_trait]
pub trait CoachModelService: Send + Sync {
    /// Generates a complete reply.
    async fn complete(&self, prompt: &str, settings: &GenerationSettings) -> PortResult<String>;

    /// Generates a reply as a stream of chunks. Dropping the stream abandons
    /// generation.
    async fn complete_streaming(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> PortResult<ChunkStream>;
}
