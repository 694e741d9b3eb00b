//! Cooperative cancellation.
//!
//! A [`CancelToken`] is checked at every suspension point inside the
//! pipelines (stream read/write, queue push/pop, reorder-slot wait). It is
//! cheap to clone and share across the reader, emitter, and every worker
//! thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shared, cooperative cancellation flag.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
