//! Shared fixtures for integration tests.

#![allow(dead_code)]

use rustc_hash::FxHashMap;
use tokentrim::{Rank, Tokenizer};

/// Pattern cutting text into runs of non-whitespace and runs of whitespace.
pub const WORDS_PATTERN: &str = r"\S+|\s+";

/// Encoder holding every single byte at the rank equal to its value.
pub fn byte_encoder() -> FxHashMap<Vec<u8>, Rank> {
    (0u8..=255).map(|b| (vec![b], b as Rank)).collect()
}

/// Byte-level tokenizer with no merges: one token per byte.
pub fn create_byte_tokenizer(special: &[(&str, Rank)]) -> Tokenizer {
    let special_tokens = special
        .iter()
        .map(|&(token, rank)| (token.to_string(), rank))
        .collect();
    Tokenizer::new(byte_encoder(), special_tokens, WORDS_PATTERN).unwrap()
}

/// Byte-level tokenizer with a handful of merges for English text.
pub fn create_merging_tokenizer(cache_size: usize) -> Tokenizer {
    let mut encoder = byte_encoder();
    let merges: &[&[u8]] = &[
        b"he", b"ll", b"hell", b"lo", b" w", b"or", b"ld", b" wor", b" world", b"th", b"the",
        b" the",
    ];
    for (i, merge) in merges.iter().enumerate() {
        encoder.insert(merge.to_vec(), 256 + i as Rank);
    }

    let mut special_tokens = FxHashMap::default();
    special_tokens.insert("<|endoftext|>".to_string(), 1000);

    Tokenizer::with_cache_size(
        encoder,
        special_tokens,
        tokentrim::CL100K_BASE_PATTERN,
        cache_size,
    )
    .unwrap()
}
