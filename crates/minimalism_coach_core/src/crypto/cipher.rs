//! crates/minimalism_coach_core/src/crypto/cipher.rs
//!
//! AES-256-GCM wrapper that turns a [`VaultDocument`] into the opaque blob
//! persisted by the vault store, and back.
//!
//! The blob keeps the nonce, authentication tag, and ciphertext as separate
//! base64 fields, matching the persisted layout this store has always used.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use super::{
    CryptoError, CryptoResult, EncryptionKey, ENCRYPTION_ALGORITHM, NONCE_LEN, TAG_LEN,
    VAULT_FORMAT_VERSION,
};
use crate::domain::VaultDocument;

/// The encrypted-at-rest representation of a vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedVault {
    pub version: u32,
    pub algorithm: String,
    pub iv: String,
    pub auth_tag: String,
    pub ciphertext: String,
    pub updated_at: DateTime<Utc>,
    /// PBKDF2 iteration count the key for this blob was derived with.
    pub iterations: u32,
}

/// Serializes and encrypts a vault document.
///
/// Rejects documents whose serialized form exceeds `max_bytes` before any
/// cipher work. A fresh random nonce is generated per call; a nonce is never
/// reused for a given key.
pub fn seal_vault(
    key: &EncryptionKey,
    document: &VaultDocument,
    max_bytes: usize,
    iterations: u32,
) -> CryptoResult<EncryptedVault> {
    let serialized =
        serde_json::to_vec(document).map_err(|e| CryptoError::MalformedBlob(e.to_string()))?;
    if serialized.len() > max_bytes {
        return Err(CryptoError::VaultTooLarge {
            size: serialized.len(),
            limit: max_bytes,
        });
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), serialized.as_ref())
        .map_err(|_| CryptoError::MalformedBlob("encryption failure".to_string()))?;

    // aes-gcm appends the tag to the ciphertext; split it back out so the
    // persisted blob keeps its historical field layout.
    let (body, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    Ok(EncryptedVault {
        version: VAULT_FORMAT_VERSION,
        algorithm: ENCRYPTION_ALGORITHM.to_string(),
        iv: BASE64.encode(nonce_bytes),
        auth_tag: BASE64.encode(tag),
        ciphertext: BASE64.encode(body),
        updated_at: Utc::now(),
        iterations,
    })
}

/// Decrypts and deserializes a vault blob.
///
/// Fails with [`CryptoError::AuthenticationFailed`] when the tag does not
/// verify (wrong key, corruption, tampering) and [`CryptoError::MalformedBlob`]
/// when the blob is structurally invalid. Never returns partial data.
pub fn open_vault(key: &EncryptionKey, blob: &EncryptedVault) -> CryptoResult<VaultDocument> {
    if blob.algorithm != ENCRYPTION_ALGORITHM {
        return Err(CryptoError::MalformedBlob(format!(
            "unsupported algorithm '{}'",
            blob.algorithm
        )));
    }

    let iv = BASE64
        .decode(&blob.iv)
        .map_err(|_| CryptoError::MalformedBlob("invalid iv".to_string()))?;
    if iv.len() != NONCE_LEN {
        return Err(CryptoError::MalformedBlob("bad iv length".to_string()));
    }

    let tag = BASE64
        .decode(&blob.auth_tag)
        .map_err(|_| CryptoError::MalformedBlob("invalid auth tag".to_string()))?;
    if tag.len() != TAG_LEN {
        return Err(CryptoError::MalformedBlob("bad auth tag length".to_string()));
    }

    let mut ciphertext = BASE64
        .decode(&blob.ciphertext)
        .map_err(|_| CryptoError::MalformedBlob("invalid ciphertext".to_string()))?;
    ciphertext.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    serde_json::from_slice(&plaintext).map_err(|e| CryptoError::MalformedBlob(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::derive_key;
    use crate::domain::{ChatEntry, Phase};

    const MAX_BYTES: usize = 512_000;
    const TEST_ITERATIONS: u32 = 1_000;

    fn test_key(password: &str) -> EncryptionKey {
        derive_key(password, "c29tZS1zYWx0LWJ5dGVz", TEST_ITERATIONS).unwrap()
    }

    fn sample_document() -> VaultDocument {
        let mut doc = VaultDocument::new(uuid::Uuid::new_v4(), Some("Ada"));
        doc.progress.current_phase = Phase::Reduction;
        doc.conversation_history.push(ChatEntry {
            role: "user".to_string(),
            content: "I want to get under 200 items".to_string(),
            timestamp: None,
        });
        doc
    }

    #[test]
    fn round_trip_recovers_the_document() {
        let key = test_key("password123");
        let doc = sample_document();
        let blob = seal_vault(&key, &doc, MAX_BYTES, TEST_ITERATIONS).unwrap();
        let opened = open_vault(&key, &blob).unwrap();
        assert_eq!(opened, doc);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let blob = seal_vault(
            &test_key("password123"),
            &sample_document(),
            MAX_BYTES,
            TEST_ITERATIONS,
        )
        .unwrap();
        assert!(matches!(
            open_vault(&test_key("other-password"), &blob),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let key = test_key("password123");
        let mut blob = seal_vault(&key, &sample_document(), MAX_BYTES, TEST_ITERATIONS).unwrap();
        let mut raw = BASE64.decode(&blob.ciphertext).unwrap();
        raw[0] ^= 0x01;
        blob.ciphertext = BASE64.encode(raw);
        assert!(matches!(
            open_vault(&key, &blob),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn nonces_are_fresh_per_call() {
        let key = test_key("password123");
        let doc = sample_document();
        let a = seal_vault(&key, &doc, MAX_BYTES, TEST_ITERATIONS).unwrap();
        let b = seal_vault(&key, &doc, MAX_BYTES, TEST_ITERATIONS).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn oversized_document_is_rejected_before_encryption() {
        let key = test_key("password123");
        let mut doc = sample_document();
        doc.conversation_history.push(ChatEntry {
            role: "user".to_string(),
            content: "x".repeat(4_096),
            timestamp: None,
        });
        let err = seal_vault(&key, &doc, 1_024, TEST_ITERATIONS).unwrap_err();
        assert!(matches!(err, CryptoError::VaultTooLarge { limit: 1_024, .. }));
    }

    #[test]
    fn structurally_invalid_blob_is_malformed_not_auth_failure() {
        let key = test_key("password123");
        let mut blob = seal_vault(&key, &sample_document(), MAX_BYTES, TEST_ITERATIONS).unwrap();
        blob.iv = "@@@".to_string();
        assert!(matches!(
            open_vault(&key, &blob),
            Err(CryptoError::MalformedBlob(_))
        ));
    }
}
