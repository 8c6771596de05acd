//! tokentrim - byte-pair encoding tokenizer with prompt truncation
//!
//! - Nested hash trie over 6-byte key chunks for allocation-free pair lookups
//! - Lowest-rank-first BPE merging
//! - Bounded LRU cache of merged pieces
//! - Aho-Corasick matching of allowed special tokens
//! - `encode_trim_suffix` / `encode_trim_prefix` to fit a prompt into a token
//!   budget while keeping text and tokens in sync
//! - Rayon batch encoding and a UTF-8 streaming decoder

pub mod core;

pub use crate::core::{
    Encoding, PieceCache, Rank, RankTrie, StreamingDecoder, Tokenizer, TokenizerError,
    TrimmedTokens, VocabError, CL100K_BASE_PATTERN, DEFAULT_CACHE_SIZE, ENDOFTEXT,
    O200K_BASE_PATTERN, R50K_BASE_PATTERN,
};
