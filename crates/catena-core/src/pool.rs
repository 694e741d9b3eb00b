//! Thread-safe pool of reusable byte buffers.
//!
//! Not a correctness requirement by itself (a correct implementation could
//! allocate fresh per chunk) — but zeroizing a buffer before it re-enters
//! the free list *is* a correctness requirement, since a released buffer
//! may have carried plaintext or key material.

use std::sync::Mutex;

use crate::key::zeroize_buffer;

/// A pool of same-size buffers, bounded implicitly by the pipeline's
/// reorder-window capacity (nothing rents more than `window_cap` buffers
/// concurrently, so the free list never grows past that).
pub struct BufferPool {
    size_class: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    #[must_use]
    pub fn new(size_class: usize) -> Self {
        Self {
            size_class,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Rent a zero-length, `size_class`-capacity buffer, reusing a
    /// previously released one when available.
    pub fn rent(&self) -> Vec<u8> {
        let mut free = self.free.lock().unwrap();
        free.pop().unwrap_or_else(|| Vec::with_capacity(self.size_class))
    }

    /// Zero the buffer's contents and return it to the free list for
    /// reuse.
    pub fn release(&self, mut buf: Vec<u8>) {
        zeroize_buffer(&mut buf);
        buf.clear();
        let mut free = self.free.lock().unwrap();
        free.push(buf);
    }

    /// Number of buffers currently sitting idle in the pool (for tests).
    #[cfg(test)]
    pub fn idle_count(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rent_then_release_reuses_buffer() {
        let pool = BufferPool::new(16);
        let buf = pool.rent();
        assert_eq!(pool.idle_count(), 0);
        pool.release(buf);
        assert_eq!(pool.idle_count(), 1);
        let _buf2 = pool.rent();
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn released_buffer_is_zeroized() {
        let pool = BufferPool::new(16);
        let mut buf = pool.rent();
        buf.extend_from_slice(b"super secret plaintext!");
        pool.release(buf);

        let recycled = pool.rent();
        // `release` clears the buffer before returning it to the free
        // list, and `rent` hands back whatever is in the free list
        // untouched, so the recycled buffer must be empty.
        assert!(recycled.is_empty());
    }
}
