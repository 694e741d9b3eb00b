//! Streaming, chunked, authenticated file cipher built on AES-256-GCM.
//!
//! Plaintext is sealed in independently-authenticated chunks inside a
//! self-describing container (`"CTN1"`), with per-file key wrapping under
//! a caller-supplied master key and a parallel pipeline that overlaps I/O
//! with many concurrent AEAD operations while preserving strict output
//! ordering.

pub mod aead_worker;
pub mod cancel;
pub mod error;
pub mod format;
pub mod key;
pub mod keywrap;
pub mod pipeline;
pub mod pool;

pub use cancel::CancelToken;
pub use error::{CatenaError, ChunkContext};
pub use format::{MAGIC, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
pub use key::MasterKey;
pub use pipeline::{
    decrypt_stream, decrypt_to_reader, encrypt_stream, encrypt_to_reader, DecryptConfig,
    DecryptSummary, EncryptConfig, EncryptSummary,
};
