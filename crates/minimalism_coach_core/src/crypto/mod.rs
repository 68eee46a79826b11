//! crates/minimalism_coach_core/src/crypto/mod.rs
//!
//! Vault cryptography: password-based key derivation and the authenticated
//! cipher that turns a vault document into an opaque at-rest blob.

pub mod cipher;
pub mod kdf;

pub use cipher::{open_vault, seal_vault, EncryptedVault};
pub use kdf::{derive_key, generate_salt, EncryptionKey};

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;
/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;
/// Per-user encryption salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Default PBKDF2 iteration count. Deliberately expensive; override via
/// configuration, never hardcode a lower value in production paths.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 120_000;

pub const VAULT_FORMAT_VERSION: u32 = 1;
pub const ENCRYPTION_ALGORITHM: &str = "aes-256-gcm";

/// Errors raised by key derivation and the vault cipher.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The stored encryption salt is empty or not valid base64.
    #[error("encryption salt is empty or malformed")]
    InvalidSalt,

    /// The serialized document exceeds the configured byte ceiling.
    #[error("vault size {size} exceeds limit of {limit} bytes")]
    VaultTooLarge { size: usize, limit: usize },

    /// The authentication tag did not verify: wrong key, corrupted blob, or
    /// tampering. No partial plaintext is ever returned.
    #[error("vault authentication failed")]
    AuthenticationFailed,

    /// The blob is structurally invalid (bad base64, wrong field lengths,
    /// undecodable plaintext).
    #[error("vault blob is malformed: {0}")]
    MalformedBlob(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
