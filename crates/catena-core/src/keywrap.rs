//! File-key wrapping under the caller's master key.
//!
//! Seals the randomly-generated per-file data key under the long-lived
//! master key using AES-256-GCM with empty AAD, the same shape as the
//! header-key wrap used elsewhere in this crate's sibling vault code
//! (see the file-header encrypt/decrypt pair it was modeled on).

use aead::Payload;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use tracing::{debug, warn};

use crate::error::{CatenaError, ChunkContext};
use crate::key::{FileKey, MasterKey};

/// The result of sealing a file key: nonce, ciphertext+tag split apart to
/// match the file header's field layout.
pub struct WrappedKey {
    pub nonce: [u8; 12],
    pub tag: [u8; 16],
    pub ciphertext: [u8; 32],
}

/// Seal `file_key` under `master_key` with a fresh random 12-byte nonce
/// and empty AAD.
pub fn wrap_file_key(file_key: &FileKey, master_key: &MasterKey, rng: &mut dyn RngCore) -> WrappedKey {
    let mut nonce_bytes = [0u8; 12];
    rng.fill_bytes(&mut nonce_bytes);

    let key: &Key<Aes256Gcm> = master_key.as_bytes().into();
    let cipher = Aes256Gcm::new(key);
    let nonce = Nonce::from_slice(&nonce_bytes);

    // aes-gcm appends the 16-byte tag to the ciphertext.
    let sealed = cipher
        .encrypt(nonce, file_key.as_bytes().as_slice())
        .expect("AES-256-GCM seal of a 32-byte key cannot fail");

    debug!("wrapped file key under master key");

    let (ciphertext_bytes, tag_bytes) = sealed.split_at(32);
    WrappedKey {
        nonce: nonce_bytes,
        tag: tag_bytes.try_into().unwrap(),
        ciphertext: ciphertext_bytes.try_into().unwrap(),
    }
}

/// Unseal a wrapped file key. Fails with [`CatenaError::AuthFailed`] on any
/// tag mismatch (wrong master key or tampered header).
pub fn unwrap_file_key(
    wrapped: &WrappedKey,
    master_key: &MasterKey,
) -> Result<FileKey, CatenaError> {
    let key: &Key<Aes256Gcm> = master_key.as_bytes().into();
    let cipher = Aes256Gcm::new(key);
    let nonce = Nonce::from_slice(&wrapped.nonce);

    let mut msg = Vec::with_capacity(48);
    msg.extend_from_slice(&wrapped.ciphertext);
    msg.extend_from_slice(&wrapped.tag);

    let payload = Payload { msg: &msg, aad: &[] };

    let plaintext = cipher.decrypt(nonce, payload).map_err(|_| {
        warn!("file key unwrap failed - authentication tag mismatch");
        CatenaError::AuthFailed {
            context: ChunkContext::new().with_phase("key_unwrap"),
        }
    })?;

    let bytes: [u8; 32] = plaintext
        .try_into()
        .map_err(|_| CatenaError::AuthFailed {
            context: ChunkContext::new().with_phase("key_unwrap"),
        })?;

    Ok(FileKey::from_bytes(bytes))
}
