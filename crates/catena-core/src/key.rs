//! Key material newtypes.
//!
//! Both keys are 32 bytes and are zeroized on drop. `MasterKey` is borrowed
//! by the caller for the lifetime of a single operation; `FileKey` is
//! generated (encrypt) or recovered (decrypt) by the pipeline itself and
//! never outlives it.

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A 32-byte secret the caller owns, used only to wrap/unwrap file keys.
#[derive(Clone, ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    #[must_use]
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MasterKey").field(&"[REDACTED]").finish()
    }
}

/// A 32-byte per-file data key. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct FileKey([u8; 32]);

impl FileKey {
    /// Generate a fresh random file key using a cryptographic RNG.
    pub fn generate(rng: &mut dyn RngCore) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FileKey").field(&"[REDACTED]").finish()
    }
}

/// 4 random bytes fixed for every chunk of one file; half of the 12-byte
/// nonce (the other half is the monotonic chunk index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoncePrefix(pub [u8; 4]);

impl NoncePrefix {
    pub fn generate(rng: &mut dyn RngCore) -> Self {
        let mut bytes = [0u8; 4];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

/// Zeroize an owned plaintext/ciphertext buffer in place before it is
/// returned to the buffer pool or dropped. Correctness requirement, not a
/// performance optimization: a released buffer must never carry a
/// recognizable remnant of prior chunk contents.
pub fn zeroize_buffer(buf: &mut [u8]) {
    buf.zeroize();
}
