//! Size-classed free list for packet payload buffers (spec.md §5/§9 "Buffer
//! pool discipline"). The dispatcher always releases incoming buffers back
//! to the pool; handlers that forward a payload rent a fresh buffer and
//! copy into it rather than holding onto the original.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Size classes are powers of two from 256 B up to 64 KiB, matching the
/// range of real wire payloads (handshake at 136 B through the 10 MiB
/// FETCH cap, which bypasses the pool and allocates directly).
const SIZE_CLASSES: &[usize] = &[256, 1024, 4096, 16384, 65536];

pub struct BufferPool {
    free_lists: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self { free_lists: Mutex::new(HashMap::new()) }
    }

    fn size_class_for(len: usize) -> usize {
        SIZE_CLASSES.iter().copied().find(|&class| class >= len).unwrap_or(len)
    }

    /// Rent a zeroed buffer able to hold at least `len` bytes.
    pub fn rent(&self, len: usize) -> Vec<u8> {
        let class = Self::size_class_for(len);
        let mut free_lists = self.free_lists.lock();
        let mut buf = free_lists.get_mut(&class).and_then(|list| list.pop()).unwrap_or_else(|| Vec::with_capacity(class));
        buf.clear();
        buf.resize(len, 0);
        buf
    }

    /// Return a buffer to the pool for reuse. Buffers whose capacity
    /// doesn't land on one of the tracked size classes (e.g. the large
    /// one-off FETCH responses) are simply dropped.
    pub fn release(&self, mut buf: Vec<u8>) {
        let class = Self::size_class_for(buf.capacity());
        if !SIZE_CLASSES.contains(&class) {
            return;
        }
        buf.clear();
        self.free_lists.lock().entry(class).or_default().push(buf);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rented_buffer_has_requested_length() {
        let pool = BufferPool::new();
        let buf = pool.rent(100);
        assert_eq!(buf.len(), 100);
    }

    #[test]
    fn released_buffer_is_reused_on_next_rent_of_same_class() {
        let pool = BufferPool::new();
        let buf = pool.rent(200);
        let ptr_before = buf.as_ptr();
        pool.release(buf);
        let reused = pool.rent(200);
        assert_eq!(reused.as_ptr(), ptr_before);
    }

    #[test]
    fn oversized_buffer_is_dropped_not_pooled() {
        let pool = BufferPool::new();
        let buf = pool.rent(10 * 1024 * 1024);
        pool.release(buf);
        // no size class fits 10 MiB; nothing should be retained.
        assert!(pool.free_lists.lock().values().all(|list| list.is_empty()));
    }
}
