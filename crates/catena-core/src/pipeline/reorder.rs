//! Bounded reorder window.
//!
//! One slot per in-flight chunk index, addressed `index % window_cap`.
//! Workers complete out of order and drop their result into the slot for
//! their index; the emitter blocks on a condvar until the slot for
//! `next_emit` is filled, then advances strictly in index order. Because
//! the job queue feeding the workers is itself bounded to `window_cap`,
//! no two in-flight indices ever collide on the same ring slot.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::failure::FailureLatch;

struct Inner<T> {
    next_emit: u64,
    total: Option<u64>,
    slots: Vec<Option<T>>,
}

pub struct ReorderRing<T> {
    window_cap: u64,
    inner: Mutex<Inner<T>>,
    cond: Condvar,
}

/// What the emitter should do next.
pub enum Next<T> {
    /// Slot `index` was ready; here is its payload.
    Item(u64, T),
    /// The reader has finished and every dispatched index has now been
    /// emitted.
    Done,
    /// The pipeline was told to stop (cancellation or a fatal error
    /// elsewhere).
    Stopped,
}

impl<T> ReorderRing<T> {
    #[must_use]
    pub fn new(window_cap: usize) -> Self {
        Self {
            window_cap: window_cap as u64,
            inner: Mutex::new(Inner {
                next_emit: 0,
                total: None,
                slots: (0..window_cap).map(|_| None).collect(),
            }),
            cond: Condvar::new(),
        }
    }

    /// Place a completed chunk's payload into its slot.
    pub fn put(&self, index: u64, value: T) {
        let mut inner = self.inner.lock().unwrap();
        let slot = (index % self.window_cap) as usize;
        inner.slots[slot] = Some(value);
        self.cond.notify_all();
    }

    /// Tell the ring how many chunks will ever be dispatched, once the
    /// reader has hit end-of-input. Lets the emitter know when to stop
    /// waiting instead of blocking forever.
    pub fn set_total(&self, total: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.total = Some(total);
        self.cond.notify_all();
    }

    /// Block until the slot for `next_emit` is ready, the pipeline is
    /// done, or it is told to stop.
    pub fn take_next(&self, latch: &FailureLatch) -> Next<T> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if latch.should_stop() {
                return Next::Stopped;
            }
            let slot = (inner.next_emit % self.window_cap) as usize;
            if let Some(value) = inner.slots[slot].take() {
                let index = inner.next_emit;
                inner.next_emit += 1;
                return Next::Item(index, value);
            }
            if inner.total == Some(inner.next_emit) {
                return Next::Done;
            }
            let (guard, _timeout) = self
                .cond
                .wait_timeout(inner, Duration::from_millis(50))
                .unwrap();
            inner = guard;
        }
    }
}
