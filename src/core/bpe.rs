//! Lowest-rank-first byte-pair merging.
//!
//! A piece starts as one part per byte. Each part remembers the rank of the
//! byte run formed by merging it with its right neighbour. The loop repeatedly
//! merges the part holding the lowest rank (leftmost on ties) and refreshes
//! the two pair ranks touched by that merge, until no adjacent pair exists in
//! the vocabulary.
//!
//! Each merge rescans the remaining parts, so a piece costs O(n²) in the worst
//! case. Pieces come out of the splitting regex and are short, which keeps the
//! flat vector faster in practice than a heap.

use super::trie::RankTrie;
use super::Rank;

#[derive(Debug, Clone, Copy)]
struct Part {
    start: usize,
    /// Rank of the run `start..` up to the end of the next part, if mergeable.
    rank: Option<Rank>,
}

/// Position and rank of the cheapest merge, `None` once nothing can merge.
///
/// The trailing end marker is excluded. Comparing `(rank, index)` tuples picks
/// the leftmost position among equal ranks.
#[inline]
fn lowest(parts: &[Part]) -> Option<(Rank, usize)> {
    parts[..parts.len() - 1]
        .iter()
        .enumerate()
        .filter_map(|(i, part)| part.rank.map(|rank| (rank, i)))
        .min()
}

/// Run the merge loop and return the surviving part boundaries.
///
/// The result always ends with a marker part at `piece.len()`, so consecutive
/// entries delimit the final segments.
fn byte_pair_merge(piece: &[u8], trie: &RankTrie) -> Vec<Part> {
    let mut parts: Vec<Part> = Vec::with_capacity(piece.len() + 1);
    for i in 0..piece.len() - 1 {
        parts.push(Part {
            start: i,
            rank: trie.get(piece, i, i + 2),
        });
    }
    parts.push(Part {
        start: piece.len() - 1,
        rank: None,
    });
    parts.push(Part {
        start: piece.len(),
        rank: None,
    });

    // Rank of the run beginning at parts[i] once parts[i + 1] is gone. Called
    // before the removal, hence the `+ 3`.
    let merged_rank = |parts: &[Part], i: usize| -> Option<Rank> {
        if i + 3 < parts.len() {
            trie.get(piece, parts[i].start, parts[i + 3].start)
        } else {
            None
        }
    };

    while let Some((_, i)) = lowest(&parts) {
        if i > 0 {
            parts[i - 1].rank = merged_rank(&parts, i - 1);
        }
        parts[i].rank = merged_rank(&parts, i);
        parts.remove(i + 1);
    }

    parts
}

/// Encode one piece into token ranks.
///
/// Segments that end up absent from the vocabulary contribute no rank; with a
/// vocabulary covering all 256 single bytes this never happens.
pub fn byte_pair_encode(piece: &[u8], trie: &RankTrie) -> Vec<Rank> {
    match piece.len() {
        0 => return Vec::new(),
        1 => return trie.get_all(piece).into_iter().collect(),
        _ => {}
    }

    byte_pair_merge(piece, trie)
        .windows(2)
        .filter_map(|w| {
            let rank = trie.get(piece, w[0].start, w[1].start);
            if rank.is_none() {
                log::trace!(
                    "no rank for segment {:?}; dropping it",
                    &piece[w[0].start..w[1].start]
                );
            }
            rank
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_trie(extra: &[(&[u8], Rank)]) -> RankTrie {
        let mut trie = RankTrie::new();
        for b in 0u8..=255 {
            trie.set(&[b], b as Rank);
        }
        for &(bytes, rank) in extra {
            trie.set(bytes, rank);
        }
        trie
    }

    #[test]
    fn test_single_byte() {
        let trie = byte_trie(&[]);
        assert_eq!(byte_pair_encode(b"x", &trie), vec![b'x' as Rank]);
        assert!(byte_pair_encode(b"", &trie).is_empty());
    }

    #[test]
    fn test_pair_beats_singles() {
        let mut trie = RankTrie::new();
        trie.set(b"a", 0);
        trie.set(b"b", 1);
        trie.set(b"ab", 2);

        assert_eq!(byte_pair_encode(b"ab", &trie), vec![2]);
        assert_eq!(byte_pair_encode(b"ba", &trie), vec![1, 0]);
    }

    #[test]
    fn test_merges_follow_rank_order() {
        // "he" merges first, then "ll", then "hell"; "hello" is not a token.
        let trie = byte_trie(&[(b"he", 256), (b"ll", 257), (b"hell", 258)]);
        assert_eq!(byte_pair_encode(b"hello", &trie), vec![258, b'o' as Rank]);
    }

    #[test]
    fn test_lowest_rank_wins_over_leftmost() {
        // "bc" outranks "ab", so "abc" must become a + bc, not ab + c.
        let trie = byte_trie(&[(b"ab", 300), (b"bc", 256)]);
        assert_eq!(byte_pair_encode(b"abc", &trie), vec![b'a' as Rank, 256]);
    }

    #[test]
    fn test_ties_go_left() {
        let mut trie = byte_trie(&[]);
        trie.set(b"aa", 256);
        assert_eq!(byte_pair_encode(b"aaa", &trie), vec![256, b'a' as Rank]);
    }

    #[test]
    fn test_long_merges_through_nested_trie() {
        let trie = byte_trie(&[
            (b"ab", 256),
            (b"cd", 257),
            (b"ef", 258),
            (b"gh", 259),
            (b"abcd", 260),
            (b"efgh", 261),
            (b"abcdefgh", 262),
        ]);
        assert_eq!(byte_pair_encode(b"abcdefgh", &trie), vec![262]);
    }

    #[test]
    fn test_unknown_segments_are_dropped() {
        let mut trie = RankTrie::new();
        trie.set(b"a", 0);
        assert_eq!(byte_pair_encode(b"aza", &trie), vec![0, 0]);
        assert!(byte_pair_encode(b"z", &trie).is_empty());
    }
}
