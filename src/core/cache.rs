//! Bounded memoization of piece → token ranks.

use lru::LruCache;
use std::num::NonZeroUsize;

use super::Rank;

/// Least-recently-used cache of already merged pieces.
///
/// Only the merge loop writes to it, so a hit is always identical to a fresh
/// merge. A capacity of zero disables caching entirely.
#[derive(Debug)]
pub struct PieceCache {
    entries: Option<LruCache<String, Vec<Rank>>>,
}

impl PieceCache {
    /// Create a cache holding at most `capacity` pieces.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    /// Fetch the ranks for `piece`, marking it most recently used.
    pub fn get(&mut self, piece: &str) -> Option<Vec<Rank>> {
        self.entries.as_mut()?.get(piece).cloned()
    }

    /// Store the ranks for `piece`, evicting the least recently used entry
    /// when full.
    pub fn put(&mut self, piece: &str, ranks: &[Rank]) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put(piece.to_owned(), ranks.to_vec());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries; zero when caching is disabled.
    pub fn capacity(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.cap().get())
    }

    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_after_put() {
        let mut cache = PieceCache::new(4);
        cache.put("hello", &[1, 2]);
        assert_eq!(cache.get("hello"), Some(vec![1, 2]));
        assert_eq!(cache.get("world"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = PieceCache::new(2);
        cache.put("a", &[1]);
        cache.put("b", &[2]);

        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.put("c", &[3]);

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(vec![1]));
        assert_eq!(cache.get("c"), Some(vec![3]));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let mut cache = PieceCache::new(0);
        cache.put("a", &[1]);
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 0);
    }

    #[test]
    fn test_clear() {
        let mut cache = PieceCache::new(8);
        cache.put("a", &[1]);
        cache.put("b", &[2]);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 8);
    }
}
