//! LRU cache of fixed-size byte blocks fetched from a remote file.

use std::num::NonZeroUsize;

use lru::LruCache;

/// LRU cache keyed by block index.
pub struct BlockCache {
    inner: LruCache<u64, Vec<u8>>,
    hits: u64,
    misses: u64,
}

impl BlockCache {
    /// Create a cache holding at most `capacity` blocks.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(cap),
            hits: 0,
            misses: 0,
        }
    }

    /// Get a cached block, counting the lookup.
    pub fn get(&mut self, block: u64) -> Option<&Vec<u8>> {
        match self.inner.get(&block) {
            Some(data) => {
                self.hits += 1;
                Some(data)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, block: u64, data: Vec<u8>) {
        self.inner.put(block, data);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// `(hits, misses)` since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
