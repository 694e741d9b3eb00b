//! Container format codec.
//!
//! Builds and parses the file header and per-chunk headers, composes
//! nonces, and fills the fixed 32-byte AAD record. Every layout constant
//! here is part of the wire format and must not move.

use tracing::{instrument, trace};

use crate::error::{CatenaError, ChunkContext};

/// ASCII magic that opens the file header and every chunk header.
pub const MAGIC: &[u8; 4] = b"CTN1";

/// Total size of the file header, in bytes.
pub const FILE_HEADER_LEN: usize = 4 + 4 + 8 + 4 + 4 + 12 + 16 + 32;

/// Total size of one chunk header, in bytes (precedes the ciphertext).
pub const CHUNK_HEADER_LEN: usize = 4 + 4 + 8 + 4 + 16;

/// Size of the fixed AAD record bound to every chunk.
pub const AAD_LEN: usize = 32;

/// Lower bound on the configurable chunk size.
pub const MIN_CHUNK_SIZE: usize = 8 * 1024;

/// Upper bound on the configurable chunk size.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// A parsed file header.
#[derive(Clone)]
pub struct FileHeader {
    pub total_plaintext_len: i64,
    pub key_id: i32,
    pub nonce_prefix: u32,
    pub wrap_nonce: [u8; 12],
    pub wrap_tag: [u8; 16],
    pub wrapped_key: [u8; 32],
}

impl std::fmt::Debug for FileHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHeader")
            .field("total_plaintext_len", &self.total_plaintext_len)
            .field("key_id", &self.key_id)
            .field("nonce_prefix", &self.nonce_prefix)
            .field("wrap_nonce", &hex::encode(self.wrap_nonce))
            .field("wrap_tag", &hex::encode(self.wrap_tag))
            .field("wrapped_key", &"[REDACTED]")
            .finish()
    }
}

/// Build the 84-byte file header.
#[instrument(level = "debug", skip(wrap_nonce, wrap_tag, wrapped_key))]
pub fn build_file_header(
    total_plaintext_len: i64,
    key_id: i32,
    nonce_prefix: u32,
    wrap_nonce: &[u8; 12],
    wrap_tag: &[u8; 16],
    wrapped_key: &[u8; 32],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(FILE_HEADER_LEN);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(FILE_HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&total_plaintext_len.to_le_bytes());
    out.extend_from_slice(&key_id.to_le_bytes());
    out.extend_from_slice(&nonce_prefix.to_le_bytes());
    out.extend_from_slice(wrap_nonce);
    out.extend_from_slice(wrap_tag);
    out.extend_from_slice(wrapped_key);
    debug_assert_eq!(out.len(), FILE_HEADER_LEN);
    trace!(total_plaintext_len, key_id, "built file header");
    out
}

/// Parse and validate an 84-byte file header.
#[instrument(level = "debug", skip(bytes))]
pub fn read_file_header(bytes: &[u8]) -> Result<FileHeader, CatenaError> {
    let ctx = ChunkContext::new().with_phase("file_header");

    if bytes.len() < FILE_HEADER_LEN {
        return Err(CatenaError::Truncated { context: ctx });
    }
    if &bytes[0..4] != MAGIC {
        return Err(CatenaError::invalid_data("bad file header magic", ctx));
    }
    let hdr_len = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    if hdr_len != FILE_HEADER_LEN {
        return Err(CatenaError::invalid_data(
            format!("file header length field {hdr_len} != {FILE_HEADER_LEN}"),
            ctx,
        ));
    }

    let total_plaintext_len = i64::from_le_bytes(bytes[8..16].try_into().unwrap());
    let key_id = i32::from_le_bytes(bytes[16..20].try_into().unwrap());
    if key_id <= 0 {
        return Err(CatenaError::invalid_data(
            format!("key id must be positive, got {key_id}"),
            ctx,
        ));
    }
    let nonce_prefix = u32::from_le_bytes(bytes[20..24].try_into().unwrap());
    let wrap_nonce: [u8; 12] = bytes[24..36].try_into().unwrap();
    let wrap_tag: [u8; 16] = bytes[36..52].try_into().unwrap();
    let wrapped_key: [u8; 32] = bytes[52..84].try_into().unwrap();

    Ok(FileHeader {
        total_plaintext_len,
        key_id,
        nonce_prefix,
        wrap_nonce,
        wrap_tag,
        wrapped_key,
    })
}

/// A parsed chunk header (precedes the chunk's ciphertext bytes).
#[derive(Debug, Clone, Copy)]
pub struct ChunkHeader {
    pub plaintext_len: i64,
    pub chunk_index: i32,
    pub tag: [u8; 16],
}

/// Build a 36-byte chunk header.
pub fn build_chunk_header(plaintext_len: i64, chunk_index: i32, tag: &[u8; 16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CHUNK_HEADER_LEN);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(CHUNK_HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&plaintext_len.to_le_bytes());
    out.extend_from_slice(&chunk_index.to_le_bytes());
    out.extend_from_slice(tag);
    debug_assert_eq!(out.len(), CHUNK_HEADER_LEN);
    out
}

/// Parse and validate a 36-byte chunk header.
pub fn read_chunk_header(bytes: &[u8], context: &ChunkContext) -> Result<ChunkHeader, CatenaError> {
    if bytes.len() < CHUNK_HEADER_LEN {
        return Err(CatenaError::Truncated {
            context: context.clone(),
        });
    }
    if &bytes[0..4] != MAGIC {
        return Err(CatenaError::invalid_data(
            "bad chunk header magic",
            context.clone(),
        ));
    }
    let hdr_len = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    if hdr_len != CHUNK_HEADER_LEN {
        return Err(CatenaError::invalid_data(
            format!("chunk header length field {hdr_len} != {CHUNK_HEADER_LEN}"),
            context.clone(),
        ));
    }
    let plaintext_len = i64::from_le_bytes(bytes[8..16].try_into().unwrap());
    if plaintext_len < 1 || plaintext_len > MAX_CHUNK_SIZE as i64 {
        return Err(CatenaError::invalid_data(
            format!("chunk plaintext length {plaintext_len} out of range"),
            context.clone(),
        ));
    }
    let chunk_index = i32::from_le_bytes(bytes[16..20].try_into().unwrap());
    let tag: [u8; 16] = bytes[20..36].try_into().unwrap();

    Ok(ChunkHeader {
        plaintext_len,
        chunk_index,
        tag,
    })
}

/// Compose the 12-byte nonce: `prefix (4, LE) || chunk_index (8, LE)`.
#[must_use]
pub fn compose_nonce(prefix: u32, index: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[0..4].copy_from_slice(&prefix.to_le_bytes());
    nonce[4..12].copy_from_slice(&index.to_le_bytes());
    nonce
}

/// Initialize the first 12 bytes of the AAD record (magic + key id +
/// reserved) once per file; callers fill the per-chunk tail with
/// [`fill_aad_mutable`] for every chunk, avoiding a fresh allocation.
#[must_use]
pub fn init_aad_prefix(key_id: i32) -> [u8; AAD_LEN] {
    let mut aad = [0u8; AAD_LEN];
    aad[0..4].copy_from_slice(MAGIC);
    aad[4..8].copy_from_slice(&key_id.to_le_bytes());
    // bytes 8..12 reserved, already zero
    aad
}

/// Fill the per-chunk tail of an AAD buffer previously initialized by
/// [`init_aad_prefix`]: `chunk_index (LE i64)` then
/// `plaintext_length_of_chunk (LE i64)`, leaving the trailing 4 reserved
/// bytes zero.
pub fn fill_aad_mutable(aad: &mut [u8; AAD_LEN], chunk_index: i64, plaintext_length: i64) {
    aad[12..20].copy_from_slice(&chunk_index.to_le_bytes());
    aad[20..28].copy_from_slice(&plaintext_length.to_le_bytes());
    aad[28..32].copy_from_slice(&[0u8; 4]);
}
