//! LRU victim selection over the set of currently-unpinned frames (spec
//! §4.1, "LRU replacer").
//!
//! Wraps the `lru` crate (borrowed from `wcygan-sql-database`'s
//! dependency table — the teacher's own buffer-pool modules never evict
//! at all, so there is no teacher precedent for eviction ordering to
//! adapt) to keep just the ordering of evictable frame indices; actual
//! page bytes live in `BufferPool`'s frame array, not here.

use lru::LruCache;
use std::num::NonZeroUsize;

pub struct LruReplacer {
    order: LruCache<usize, ()>,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            order: LruCache::new(cap),
        }
    }

    /// Mark `frame_idx` as unpinned and evictable, most-recently-used.
    pub fn unpin(&mut self, frame_idx: usize) {
        self.order.put(frame_idx, ());
    }

    /// Remove `frame_idx` from the evictable set (it has just been pinned).
    pub fn pin(&mut self, frame_idx: usize) {
        self.order.pop(&frame_idx);
    }

    /// Evict and return the least-recently-used evictable frame index.
    pub fn victim(&mut self) -> Option<usize> {
        self.order.pop_lru().map(|(idx, ())| idx)
    }

    /// Count of currently evictable frames.
    pub fn size(&self) -> usize {
        self.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn victim_is_least_recently_unpinned() {
        let mut r = LruReplacer::new(8);
        r.unpin(1);
        r.unpin(2);
        r.unpin(3);
        assert_eq!(r.victim(), Some(1));
        assert_eq!(r.victim(), Some(2));
        r.unpin(2);
        assert_eq!(r.victim(), Some(3));
        assert_eq!(r.victim(), Some(2));
        assert_eq!(r.victim(), None);
    }

    #[test]
    fn pin_removes_from_evictable_set() {
        let mut r = LruReplacer::new(8);
        r.unpin(1);
        r.unpin(2);
        r.pin(1);
        assert_eq!(r.size(), 1);
        assert_eq!(r.victim(), Some(2));
    }
}
