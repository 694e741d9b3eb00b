//! Stateless AEAD seal/open primitive.
//!
//! Given a file key, a composed nonce, the fixed AAD record, and either
//! plaintext or ciphertext+tag, performs exactly one AES-256-GCM operation.
//! Holds no state of its own — every worker thread in the pipeline shares
//! read-only access to the same file key and calls these functions
//! directly, so there is nothing here to synchronize.

use aead::Payload;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use crate::error::{CatenaError, ChunkContext};
use crate::format::AAD_LEN;

/// Seal `plaintext` under `file_key`, returning `ciphertext || tag`
/// (ciphertext length == plaintext length, tag is the trailing 16 bytes).
pub fn seal(
    file_key: &[u8; 32],
    nonce: &[u8; 12],
    aad: &[u8; AAD_LEN],
    plaintext: &[u8],
) -> Vec<u8> {
    let key: &Key<Aes256Gcm> = file_key.into();
    let cipher = Aes256Gcm::new(key);
    let payload = Payload {
        msg: plaintext,
        aad,
    };
    cipher
        .encrypt(Nonce::from_slice(nonce), payload)
        .expect("AES-256-GCM seal cannot fail for valid inputs")
}

/// Open `ciphertext || tag` under `file_key`, returning the plaintext on
/// success. Any tag or AAD mismatch is surfaced as
/// [`CatenaError::AuthFailed`].
pub fn open(
    file_key: &[u8; 32],
    nonce: &[u8; 12],
    aad: &[u8; AAD_LEN],
    ciphertext_with_tag: &[u8],
    context: &ChunkContext,
) -> Result<Vec<u8>, CatenaError> {
    let key: &Key<Aes256Gcm> = file_key.into();
    let cipher = Aes256Gcm::new(key);
    let payload = Payload {
        msg: ciphertext_with_tag,
        aad,
    };
    cipher
        .decrypt(Nonce::from_slice(nonce), payload)
        .map_err(|_| CatenaError::AuthFailed {
            context: context.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{compose_nonce, fill_aad_mutable, init_aad_prefix};

    #[test]
    fn seal_then_open_round_trips() {
        let key = [5u8; 32];
        let nonce = compose_nonce(1, 0);
        let mut aad = init_aad_prefix(9);
        fill_aad_mutable(&mut aad, 0, 5);

        let ciphertext = seal(&key, &nonce, &aad, b"hello");
        let ctx = ChunkContext::new();
        let plaintext = open(&key, &nonce, &aad, &ciphertext, &ctx).unwrap();

        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn open_fails_on_tampered_ciphertext() {
        let key = [5u8; 32];
        let nonce = compose_nonce(1, 0);
        let mut aad = init_aad_prefix(9);
        fill_aad_mutable(&mut aad, 0, 5);

        let mut ciphertext = seal(&key, &nonce, &aad, b"hello");
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;

        let ctx = ChunkContext::new();
        assert!(matches!(
            open(&key, &nonce, &aad, &ciphertext, &ctx),
            Err(CatenaError::AuthFailed { .. })
        ));
    }

    #[test]
    fn open_fails_on_mismatched_aad() {
        let key = [5u8; 32];
        let nonce = compose_nonce(1, 0);
        let mut aad = init_aad_prefix(9);
        fill_aad_mutable(&mut aad, 0, 5);

        let ciphertext = seal(&key, &nonce, &aad, b"hello");

        let mut wrong_aad = aad;
        fill_aad_mutable(&mut wrong_aad, 1, 5);

        let ctx = ChunkContext::new();
        assert!(matches!(
            open(&key, &nonce, &wrong_aad, &ciphertext, &ctx),
            Err(CatenaError::AuthFailed { .. })
        ));
    }
}
