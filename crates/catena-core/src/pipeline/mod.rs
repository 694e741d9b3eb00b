//! Parallel, ordered chunk pipelines shared by encrypt and decrypt.
//!
//! Both directions follow the same shape: a single reader thread assigns
//! strictly monotonic chunk indices and dispatches jobs over a bounded
//! channel, a pool of worker threads perform the AEAD operation, and a
//! single emitter thread writes completed chunks to the output stream in
//! strict index order, regardless of which order the workers finished in.

mod bounded_pipe;
mod failure;
mod reorder;

pub mod decrypt;
pub mod encrypt;
pub mod pull;

pub use decrypt::{DecryptConfig, DecryptSummary, decrypt_stream};
pub use encrypt::{EncryptConfig, EncryptSummary, encrypt_stream};
pub use pull::{decrypt_to_reader, encrypt_to_reader};
