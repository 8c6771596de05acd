//! Core tokenization engine for tokentrim.
//!
//! - [`Tokenizer`]: encode/decode API, prompt truncation, piece cache and
//!   special-token matching
//! - [`RankTrie`]: nested byte-run → rank lookup used by the merge loop
//! - [`byte_pair_encode`]: lowest-rank-first byte-pair merging
//! - [`PieceCache`]: bounded LRU memoization of merged pieces
//! - [`vocab`]: tiktoken vocabulary loading and validation
//! - [`Encoding`]: named presets (splitting pattern + special tokens)
//! - [`StreamingDecoder`]: UTF-8 safe token-by-token decoding

mod bpe;
mod cache;
pub mod encoding;
mod streaming;
mod tokenizer;
mod trie;
pub mod vocab;

/// Token identifier; for vocabulary entries also the merge priority.
pub type Rank = u32;

pub use bpe::byte_pair_encode;
pub use cache::PieceCache;
pub use encoding::{
    Encoding, CL100K_BASE_PATTERN, ENDOFPROMPT, ENDOFTEXT, FIM_MIDDLE, FIM_PREFIX, FIM_SUFFIX,
    O200K_BASE_PATTERN, R50K_BASE_PATTERN,
};
pub use streaming::StreamingDecoder;
pub use tokenizer::{Tokenizer, TokenizerError, TrimmedTokens, DEFAULT_CACHE_SIZE};
pub use trie::RankTrie;
pub use vocab::{
    build_decoder, check_bijection, load_tiktoken_bpe, load_tiktoken_bpe_file, VocabError,
};
