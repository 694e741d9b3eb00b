//! First-error-wins latch shared by reader, workers, and emitter.
//!
//! Any fatal error (I/O, AEAD, nonce overflow) aborts the pipeline the same
//! way an explicit caller cancellation does: suspension points stop
//! accepting new work and in-flight workers drain. The difference is only
//! in which error surfaces at the end — the caller's own [`CancelToken`]
//! is left untouched so `is_cancelled()` still reflects what *they* asked
//! for, while this latch additionally carries the first real error and an
//! internal abort bit that every suspension point also honors.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cancel::CancelToken;
use crate::error::CatenaError;

pub struct FailureLatch {
    aborted: AtomicBool,
    first_error: Mutex<Option<CatenaError>>,
    cancel: CancelToken,
}

impl FailureLatch {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            aborted: AtomicBool::new(false),
            first_error: Mutex::new(None),
            cancel,
        }
    }

    /// Record a fatal error (first one wins) and trip the abort bit so
    /// every suspension point stops accepting new work.
    pub fn fail(&self, err: CatenaError) {
        let mut slot = self.first_error.lock().unwrap();
        if slot.is_none() {
            *slot = Some(err);
        }
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// `true` once either the caller cancelled or a fatal error occurred
    /// anywhere in the pipeline.
    pub fn should_stop(&self) -> bool {
        self.aborted.load(Ordering::SeqCst) || self.cancel.is_cancelled()
    }

    /// Consume the latch, returning the terminal error if one occurred:
    /// the first real error if any was recorded, otherwise `Cancelled` if
    /// the caller's token was tripped, otherwise `None` for success.
    pub fn into_result(self, context_phase: &'static str) -> Option<CatenaError> {
        if let Some(err) = self.first_error.into_inner().unwrap() {
            return Some(err);
        }
        if self.cancel.is_cancelled() {
            return Some(CatenaError::Cancelled {
                context: crate::error::ChunkContext::new().with_phase(context_phase),
            });
        }
        None
    }
}
