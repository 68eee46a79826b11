//! crates/minimalism_coach_core/src/crypto/kdf.rs
//!
//! Password-based key derivation for the vault cipher.
//!
//! The key is never stored: it is rederived from the password and the user's
//! per-user salt at every login. Derivation is deterministic, so the same
//! password and salt always yield the same key. The iteration count makes it
//! deliberately expensive; callers must run it off the request path
//! (`tokio::task::spawn_blocking`).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroize;

use super::{CryptoError, CryptoResult, KEY_LEN, SALT_LEN};

/// A derived 32-byte symmetric key. Zeroized on drop.
///
/// This key lives only in server-side session state; it is never sent to the
/// client, never persisted, and never logged.
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl PartialEq for EncryptionKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for EncryptionKey {}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Generates a fresh random per-user salt, base64-encoded.
///
/// Independent of the password hash's own internal salt: this one exists
/// exclusively for vault key derivation.
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    BASE64.encode(salt)
}

/// Derives the vault encryption key from a password and a stored base64 salt
/// using PBKDF2-HMAC-SHA256.
///
/// Fails with [`CryptoError::InvalidSalt`] if the salt is empty or not valid
/// base64. A record without a usable salt is a migration case that requires
/// explicit re-encryption, never a silent fix.
pub fn derive_key(password: &str, salt_b64: &str, iterations: u32) -> CryptoResult<EncryptionKey> {
    let salt = BASE64
        .decode(salt_b64)
        .map_err(|_| CryptoError::InvalidSalt)?;
    if salt.is_empty() {
        return Err(CryptoError::InvalidSalt);
    }

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut key);
    Ok(EncryptionKey(key))
}
