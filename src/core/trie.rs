//! Byte-run → rank lookup structure used by the merge loop.
//!
//! Keys are consumed in fixed 6-byte chunks. A key (or key remainder) shorter
//! than a chunk lives in the node's `finals` map; anything at least one chunk
//! long descends into a nested trie keyed by the packed first chunk. A lookup
//! therefore costs `ceil(len / 6)` hash probes instead of a byte-by-byte walk,
//! and [`RankTrie::get`] can probe any sub-range of a larger buffer without
//! copying it.

use rustc_hash::FxHashMap;

use super::Rank;

/// Number of bytes packed into one key per trie level.
const CHUNK: usize = 6;

/// Pack up to [`CHUNK`] bytes into a single integer key.
///
/// The low 24 bits hold bytes `0..3`, the next 24 bits hold bytes `3..6` and
/// the chunk length sits above bit 48, so two distinct byte runs of at most
/// six bytes never share a key (`[0]` and `[0, 0]` included).
#[inline]
fn pack(bytes: &[u8]) -> u64 {
    debug_assert!(bytes.len() <= CHUNK);

    let mut lower = 0u64;
    let mut upper = 0u64;
    for (i, &b) in bytes.iter().enumerate() {
        if i < 3 {
            lower |= u64::from(b) << (8 * i);
        } else {
            upper |= u64::from(b) << (8 * (i - 3));
        }
    }

    ((bytes.len() as u64) << 48) | (upper << 24) | lower
}

/// A nested hash trie mapping byte sequences to BPE ranks.
#[derive(Debug, Default, Clone)]
pub struct RankTrie {
    finals: FxHashMap<u64, Rank>,
    nested: FxHashMap<u64, RankTrie>,
    len: usize,
}

impl RankTrie {
    /// Create an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `bytes` with the given rank, replacing any previous rank.
    pub fn set(&mut self, bytes: &[u8], rank: Rank) {
        let mut node = &mut *self;
        let mut rest = bytes;
        while rest.len() >= CHUNK {
            node = node.nested.entry(pack(&rest[..CHUNK])).or_default();
            rest = &rest[CHUNK..];
        }

        if node.finals.insert(pack(rest), rank).is_none() {
            self.len += 1;
        }
    }

    /// Look up the rank of `bytes[start..end]`.
    ///
    /// Returns `None` when that exact byte run is not in the vocabulary or the
    /// range is out of bounds.
    #[inline]
    pub fn get(&self, bytes: &[u8], start: usize, end: usize) -> Option<Rank> {
        if start > end || end > bytes.len() {
            return None;
        }

        let mut node = self;
        let mut pos = start;
        while end - pos >= CHUNK {
            node = node.nested.get(&pack(&bytes[pos..pos + CHUNK]))?;
            pos += CHUNK;
        }

        node.finals.get(&pack(&bytes[pos..end])).copied()
    }

    /// Look up the rank of a whole byte sequence.
    #[inline]
    pub fn get_all(&self, bytes: &[u8]) -> Option<Rank> {
        self.get(bytes, 0, bytes.len())
    }

    /// Number of distinct byte sequences stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl FromIterator<(Vec<u8>, Rank)> for RankTrie {
    fn from_iter<I: IntoIterator<Item = (Vec<u8>, Rank)>>(iter: I) -> Self {
        let mut trie = RankTrie::new();
        for (bytes, rank) in iter {
            trie.set(&bytes, rank);
        }
        trie
    }
}

impl<'a> FromIterator<(&'a Vec<u8>, &'a Rank)> for RankTrie {
    fn from_iter<I: IntoIterator<Item = (&'a Vec<u8>, &'a Rank)>>(iter: I) -> Self {
        let mut trie = RankTrie::new();
        for (bytes, &rank) in iter {
            trie.set(bytes, rank);
        }
        trie
    }
}
