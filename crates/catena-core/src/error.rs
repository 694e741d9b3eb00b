//! Error types for the streaming cipher pipelines.
//!
//! Mirrors the context-carrying error style used throughout this crate's
//! sibling vault code: each variant names the failure precisely and, where
//! it happened mid-stream, carries a [`ChunkContext`] so callers can log or
//! report which chunk triggered it without re-deriving it from a stack trace.

use std::fmt;
use std::io;

use thiserror::Error;

/// Where in the chunk stream an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ChunkContext {
    /// The chunk index being processed, if known.
    pub chunk_index: Option<u64>,
    /// Human-readable phase name (e.g. "header", "seal", "open", "emit").
    pub phase: Option<&'static str>,
}

impl ChunkContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_index(mut self, index: u64) -> Self {
        self.chunk_index = Some(index);
        self
    }

    #[must_use]
    pub fn with_phase(mut self, phase: &'static str) -> Self {
        self.phase = Some(phase);
        self
    }
}

impl fmt::Display for ChunkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.chunk_index, self.phase) {
            (Some(i), Some(p)) => write!(f, "chunk {i} ({p})"),
            (Some(i), None) => write!(f, "chunk {i}"),
            (None, Some(p)) => write!(f, "({p})"),
            (None, None) => write!(f, "(no context)"),
        }
    }
}

/// The complete error taxonomy for encrypt/decrypt operations.
///
/// Every public pipeline entry point returns `Result<_, CatenaError>`. No
/// variant here is recoverable by the library itself: all are surfaced to
/// the caller, which is expected to discard any partial output.
#[derive(Error, Debug)]
pub enum CatenaError {
    /// Configuration out of allowed range, or a null/closed stream.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Structural container error: magic mismatch, bad lengths, trailing
    /// bytes, or an out-of-order/duplicate chunk index.
    #[error("invalid container data at {context}: {reason}")]
    InvalidData {
        reason: String,
        context: ChunkContext,
    },

    /// End of input before a declared record completed.
    #[error("truncated input at {context}")]
    Truncated { context: ChunkContext },

    /// AEAD tag mismatch, including strict-length-check failures and
    /// tampered chunk headers.
    #[error("authentication failed at {context}")]
    AuthFailed { context: ChunkContext },

    /// The header's key ID does not match the caller-supplied key ID.
    #[error("key id mismatch: header declares {header_key_id}, expected {expected_key_id}")]
    KeyIdMismatch {
        header_key_id: i32,
        expected_key_id: i32,
    },

    /// The chunk index would exceed `u64::MAX`; continuing would force a
    /// nonce reuse under the same file key.
    #[error("nonce counter would overflow at {context}")]
    NonceOverflow { context: ChunkContext },

    /// Caller cancellation observed at a suspension point.
    #[error("operation cancelled at {context}")]
    Cancelled { context: ChunkContext },

    /// Underlying I/O error on the input or output stream.
    #[error("io error at {context}: {source}")]
    Io {
        #[source]
        source: io::Error,
        context: ChunkContext,
    },
}

impl From<io::Error> for CatenaError {
    fn from(source: io::Error) -> Self {
        CatenaError::Io {
            source,
            context: ChunkContext::new(),
        }
    }
}

impl CatenaError {
    #[must_use]
    pub fn io_with_context(source: io::Error, context: ChunkContext) -> Self {
        CatenaError::Io { source, context }
    }

    #[must_use]
    pub fn invalid_data(reason: impl Into<String>, context: ChunkContext) -> Self {
        CatenaError::InvalidData {
            reason: reason.into(),
            context,
        }
    }

    /// `true` for the variants that must never be treated as "some
    /// plaintext was safely emitted" by a caller — covers every
    /// authentication- or structure-related failure.
    #[must_use]
    pub fn is_fatal_tamper_evidence(&self) -> bool {
        matches!(
            self,
            CatenaError::AuthFailed { .. } | CatenaError::InvalidData { .. } | CatenaError::Truncated { .. }
        )
    }
}
