use aho_corasick::{AhoCorasick, Input, MatchKind};
use fancy_regex::Regex;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

use super::bpe::byte_pair_encode;
use super::cache::PieceCache;
use super::encoding::Encoding;
use super::trie::RankTrie;
use super::vocab::{
    build_decoder, check_bijection, load_tiktoken_bpe, load_tiktoken_bpe_file, VocabError,
};
use super::Rank;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Regex compilation error: {0}")]
    RegexError(#[from] Box<fancy_regex::Error>),
    #[error("Vocabulary error: {0}")]
    VocabError(#[from] VocabError),
    #[error("Decoding error: invalid UTF-8")]
    Utf8Error,
    #[error("Aho-Corasick build error: {0}")]
    AhoCorasickError(#[from] aho_corasick::BuildError),
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),
}

impl From<fancy_regex::Error> for TokenizerError {
    fn from(e: fancy_regex::Error) -> Self {
        Self::RegexError(Box::new(e))
    }
}

/// Default number of pieces kept in the merge cache.
pub const DEFAULT_CACHE_SIZE: usize = 8192;

/// Result of a budget-constrained encode: the kept ranks and the text they
/// were taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimmedTokens {
    pub ids: Vec<Rank>,
    pub text: String,
}

/// A stretch of input text between special-token boundaries.
#[derive(Debug, Clone, Copy)]
enum Segment<'t> {
    /// Ordinary text starting at byte offset `start` of the input.
    Ordinary { start: usize, text: &'t str },
    /// An allowed special token ending at byte offset `end` of the input.
    Special { end: usize, rank: Rank },
}

/// Byte offset just past the character starting at `pos`.
#[inline]
fn next_char_boundary(text: &str, pos: usize) -> usize {
    pos + text[pos..].chars().next().map_or(1, char::len_utf8)
}

/// Byte-pair encoding tokenizer with prompt truncation support.
///
/// Text is cut at allowed special tokens, the ordinary stretches in between are
/// split into pieces by the splitting pattern, and every piece is resolved
/// through the merge cache or the lowest-rank-first merge loop.
///
/// The tokenizer can be shared between threads: the only mutable state is the
/// piece cache, which sits behind a mutex. Batch methods use Rayon to encode
/// several texts in parallel.
///
/// ```ignore
/// let tokenizer = Tokenizer::from_encoding_file(Encoding::Cl100kBase, "cl100k_base.tiktoken")?;
/// let ids = tokenizer.encode("hello<|endoftext|>", &["<|endoftext|>"]);
/// let trimmed = tokenizer.encode_trim_prefix(long_prompt, 2048, &[]);
/// ```
pub struct Tokenizer {
    trie: RankTrie,
    decoder: FxHashMap<Rank, Vec<u8>>,
    special_tokens: FxHashMap<String, Rank>,
    special_tokens_decoder: FxHashMap<Rank, String>,
    special_token_strings: Vec<String>,
    regex: Regex,
    pattern: String,
    special_matcher: Option<AhoCorasick>,
    piece_cache: Mutex<PieceCache>,
    cache_size: usize,
}

impl Tokenizer {
    /// Create a new tokenizer from encoder map, special tokens, and splitting
    /// pattern.
    ///
    /// # Arguments
    /// * `encoder` - Map of byte sequences to ranks
    /// * `special_tokens` - Map of special token strings to ranks
    /// * `pattern` - Regex pattern cutting text into pieces
    pub fn new(
        encoder: FxHashMap<Vec<u8>, Rank>,
        special_tokens: FxHashMap<String, Rank>,
        pattern: &str,
    ) -> Result<Self, TokenizerError> {
        Self::with_cache_size(encoder, special_tokens, pattern, DEFAULT_CACHE_SIZE)
    }

    /// Create a new tokenizer with a custom piece cache size; `0` disables the
    /// cache.
    pub fn with_cache_size(
        encoder: FxHashMap<Vec<u8>, Rank>,
        special_tokens: FxHashMap<String, Rank>,
        pattern: &str,
        cache_size: usize,
    ) -> Result<Self, TokenizerError> {
        let decoder = build_decoder(&encoder);
        Self::from_parts(encoder, decoder, special_tokens, pattern, cache_size)
    }

    /// Create a tokenizer from a tiktoken vocabulary file.
    pub fn from_file<P: AsRef<Path>>(
        vocab_path: P,
        pattern: &str,
        special_tokens: FxHashMap<String, Rank>,
    ) -> Result<Self, TokenizerError> {
        Self::from_file_with_cache_size(vocab_path, pattern, special_tokens, DEFAULT_CACHE_SIZE)
    }

    /// Same as [`Tokenizer::from_file`] with a custom piece cache size.
    pub fn from_file_with_cache_size<P: AsRef<Path>>(
        vocab_path: P,
        pattern: &str,
        special_tokens: FxHashMap<String, Rank>,
        cache_size: usize,
    ) -> Result<Self, TokenizerError> {
        let (encoder, decoder) = load_tiktoken_bpe_file(vocab_path)?;
        Self::from_parts(encoder, decoder, special_tokens, pattern, cache_size)
    }

    /// Create a tokenizer from raw tiktoken vocabulary bytes.
    pub fn from_bytes(
        vocab_data: &[u8],
        pattern: &str,
        special_tokens: FxHashMap<String, Rank>,
    ) -> Result<Self, TokenizerError> {
        Self::from_bytes_with_cache_size(vocab_data, pattern, special_tokens, DEFAULT_CACHE_SIZE)
    }

    /// Same as [`Tokenizer::from_bytes`] with a custom piece cache size.
    pub fn from_bytes_with_cache_size(
        vocab_data: &[u8],
        pattern: &str,
        special_tokens: FxHashMap<String, Rank>,
        cache_size: usize,
    ) -> Result<Self, TokenizerError> {
        let (encoder, decoder) = load_tiktoken_bpe(vocab_data)?;
        Self::from_parts(encoder, decoder, special_tokens, pattern, cache_size)
    }

    /// Create a tokenizer for a named preset from its tiktoken vocabulary file.
    pub fn from_encoding_file<P: AsRef<Path>>(
        encoding: Encoding,
        vocab_path: P,
    ) -> Result<Self, TokenizerError> {
        Self::from_encoding_file_with_cache_size(encoding, vocab_path, DEFAULT_CACHE_SIZE)
    }

    /// Same as [`Tokenizer::from_encoding_file`] with a custom piece cache size.
    pub fn from_encoding_file_with_cache_size<P: AsRef<Path>>(
        encoding: Encoding,
        vocab_path: P,
        cache_size: usize,
    ) -> Result<Self, TokenizerError> {
        Self::from_file_with_cache_size(
            vocab_path,
            encoding.pattern(),
            encoding.special_tokens(),
            cache_size,
        )
    }

    /// Same as [`Tokenizer::from_encoding_file`], looking the preset up by name.
    pub fn from_encoding_name<P: AsRef<Path>>(
        name: &str,
        vocab_path: P,
    ) -> Result<Self, TokenizerError> {
        let encoding = Encoding::from_name(name).ok_or_else(|| {
            TokenizerError::UnknownEncoding(format!(
                "{}. Supported: {}",
                name,
                Encoding::supported_names().join(", ")
            ))
        })?;
        Self::from_encoding_file(encoding, vocab_path)
    }

    fn from_parts(
        encoder: FxHashMap<Vec<u8>, Rank>,
        decoder: FxHashMap<Rank, Vec<u8>>,
        mut special_tokens: FxHashMap<String, Rank>,
        pattern: &str,
        cache_size: usize,
    ) -> Result<Self, TokenizerError> {
        check_bijection(&encoder, &decoder)?;

        let trie: RankTrie = encoder.iter().collect();
        let regex = Regex::new(pattern)?;

        // An empty marker would match at every position.
        if special_tokens.remove("").is_some() {
            log::warn!("ignoring empty special token");
        }
        let special_tokens_decoder: FxHashMap<Rank, String> = special_tokens
            .iter()
            .map(|(k, v)| (*v, k.clone()))
            .collect();

        let special_token_strings: Vec<String> = special_tokens.keys().cloned().collect();
        let special_matcher = if special_token_strings.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(&special_token_strings)?,
            )
        };

        log::debug!(
            "built tokenizer: {} vocabulary entries, {} special tokens, cache size {}",
            trie.len(),
            special_tokens.len(),
            cache_size
        );

        Ok(Self {
            trie,
            decoder,
            special_tokens,
            special_tokens_decoder,
            special_token_strings,
            regex,
            pattern: pattern.to_string(),
            special_matcher,
            piece_cache: Mutex::new(PieceCache::new(cache_size)),
            cache_size,
        })
    }

    /// Cut `text` at the special tokens listed in `allowed_special`.
    ///
    /// A special token that is found but not allowed stays part of the
    /// surrounding ordinary text, and the search resumes one character after
    /// where it started.
    fn split_special<'t>(&self, text: &'t str, allowed_special: &[&str]) -> Vec<Segment<'t>> {
        let mut segments = Vec::new();
        let mut start = 0;

        if let (Some(matcher), false) = (&self.special_matcher, allowed_special.is_empty()) {
            let mut search = 0;
            while search < text.len() {
                let Some(m) = matcher.find(Input::new(text).span(search..text.len())) else {
                    break;
                };

                let token = &text[m.start()..m.end()];
                let rank = match self.special_tokens.get(token) {
                    Some(&rank) if allowed_special.contains(&token) => rank,
                    _ => {
                        search = next_char_boundary(text, m.start());
                        continue;
                    }
                };

                if m.start() > start {
                    segments.push(Segment::Ordinary {
                        start,
                        text: &text[start..m.start()],
                    });
                }
                segments.push(Segment::Special { end: m.end(), rank });
                start = m.end();
                search = m.end();
            }
        }

        if start < text.len() {
            segments.push(Segment::Ordinary {
                start,
                text: &text[start..],
            });
        }

        segments
    }

    /// Split an ordinary stretch into pieces, yielding `(end_offset, piece)`
    /// with offsets relative to the stretch.
    ///
    /// A runtime regex failure (e.g. the backtrack limit) ends the split: the
    /// rest of the stretch past the last match comes out as one final piece.
    fn pieces<'t>(&'t self, text: &'t str) -> impl Iterator<Item = (usize, &'t str)> + 't {
        let mut matches = self.regex.find_iter(text);
        let mut last_end = 0;
        let mut done = false;

        std::iter::from_fn(move || {
            if done {
                return None;
            }
            match matches.next() {
                Some(Ok(m)) => {
                    last_end = m.end();
                    Some((m.end(), m.as_str()))
                }
                Some(Err(e)) => {
                    // The failing search does not advance, so retrying would loop.
                    done = true;
                    log::warn!(
                        "splitting pattern failed at byte {last_end}, keeping the remaining {} bytes as one piece: {e}",
                        text.len() - last_end
                    );
                    (last_end < text.len()).then(|| (text.len(), &text[last_end..]))
                }
                None => {
                    done = true;
                    None
                }
            }
        })
    }

    /// Resolve one piece to ranks via the whole-token fast path, the cache, or
    /// the merge loop.
    fn encode_piece(&self, piece: &str) -> Vec<Rank> {
        let bytes = piece.as_bytes();
        if let Some(rank) = self.trie.get_all(bytes) {
            return vec![rank];
        }

        if let Ok(mut cache) = self.piece_cache.lock() {
            if let Some(cached) = cache.get(piece) {
                return cached;
            }
        }

        // The lock is released while merging. Two threads missing on the same
        // piece both merge it and store identical ranks.
        let ranks = byte_pair_encode(bytes, &self.trie);

        if let Ok(mut cache) = self.piece_cache.lock() {
            cache.put(piece, &ranks);
        }

        ranks
    }

    /// Encode text to ranks, treating the special tokens listed in
    /// `allowed_special` as single tokens and everything else as plain text.
    pub fn encode(&self, text: &str, allowed_special: &[&str]) -> Vec<Rank> {
        let mut ids = Vec::new();
        for segment in self.split_special(text, allowed_special) {
            match segment {
                Segment::Ordinary { text, .. } => {
                    for (_, piece) in self.pieces(text) {
                        ids.extend(self.encode_piece(piece));
                    }
                }
                Segment::Special { rank, .. } => ids.push(rank),
            }
        }
        ids
    }

    /// Encode text, ignoring special tokens entirely.
    pub fn encode_ordinary(&self, text: &str) -> Vec<Rank> {
        self.encode(text, &[])
    }

    /// Encode text with every known special token allowed.
    pub fn encode_with_special(&self, text: &str) -> Vec<Rank> {
        let allowed: Vec<&str> = self.special_token_strings.iter().map(String::as_str).collect();
        self.encode(text, &allowed)
    }

    /// Number of tokens `text` encodes to.
    pub fn count_tokens(&self, text: &str, allowed_special: &[&str]) -> usize {
        self.encode(text, allowed_special).len()
    }

    /// Encode at most `max_tokens` tokens from the start of `text`.
    ///
    /// Pieces are taken whole while they fit. The first piece that overflows
    /// contributes only the ranks that still fit, but the returned text still
    /// covers that whole piece. A special token counts as one token and is only
    /// taken if it fits.
    pub fn encode_trim_suffix(
        &self,
        text: &str,
        max_tokens: usize,
        allowed_special: &[&str],
    ) -> TrimmedTokens {
        let mut ids = Vec::new();
        let mut encode_len = 0;

        'scan: for segment in self.split_special(text, allowed_special) {
            match segment {
                Segment::Ordinary { start, text } => {
                    for (end, piece) in self.pieces(text) {
                        if ids.len() >= max_tokens {
                            break 'scan;
                        }

                        let piece_ids = self.encode_piece(piece);
                        let remaining = max_tokens - ids.len();
                        encode_len = start + end;
                        if piece_ids.len() <= remaining {
                            ids.extend(piece_ids);
                        } else {
                            ids.extend_from_slice(&piece_ids[..remaining]);
                            break 'scan;
                        }
                    }
                }
                Segment::Special { end, rank } => {
                    if ids.len() >= max_tokens {
                        break 'scan;
                    }
                    ids.push(rank);
                    encode_len = end;
                }
            }
        }

        TrimmedTokens {
            ids,
            text: text[..encode_len].to_string(),
        }
    }

    /// Encode the last tokens of `text`, dropping whole pieces from the front
    /// until at most `max_tokens` remain.
    ///
    /// The cut lands on the first piece or special-token boundary that drops
    /// enough tokens, so the result may hold fewer than `max_tokens` ranks.
    /// When that boundary drops more tokens than `max_tokens`, the result is
    /// instead the last `max_tokens` ranks and their decoded text, which may
    /// split a piece.
    pub fn encode_trim_prefix(
        &self,
        text: &str,
        max_tokens: usize,
        allowed_special: &[&str],
    ) -> TrimmedTokens {
        let mut ids = Vec::new();
        // Cumulative token count -> cumulative byte offset at every boundary.
        let mut boundaries: BTreeMap<usize, usize> = BTreeMap::new();
        boundaries.insert(0, 0);

        for segment in self.split_special(text, allowed_special) {
            match segment {
                Segment::Ordinary { start, text } => {
                    for (end, piece) in self.pieces(text) {
                        ids.extend(self.encode_piece(piece));
                        boundaries.insert(ids.len(), start + end);
                    }
                }
                Segment::Special { end, rank } => {
                    ids.push(rank);
                    boundaries.insert(ids.len(), end);
                }
            }
        }

        if ids.len() <= max_tokens {
            return TrimmedTokens {
                ids,
                text: text.to_string(),
            };
        }

        let drop_count = ids.len() - max_tokens;
        match boundaries.range(drop_count..).next() {
            Some((&count, &offset)) if count <= max_tokens => TrimmedTokens {
                ids: ids.split_off(count),
                text: text[offset..].to_string(),
            },
            _ => {
                log::debug!(
                    "no piece boundary keeps {max_tokens} of {} tokens; slicing ranks",
                    ids.len()
                );
                let tail = ids.split_off(drop_count);
                let text = self.decode(&tail);
                TrimmedTokens { ids: tail, text }
            }
        }
    }

    /// Decode ranks back to bytes.
    ///
    /// Ranks found in neither the vocabulary nor the special-token table
    /// contribute no bytes.
    pub fn decode_bytes(&self, tokens: &[Rank]) -> Vec<u8> {
        let mut result = Vec::with_capacity(tokens.len() * 4);

        for token in tokens {
            if let Some(bytes) = self.decoder.get(token) {
                result.extend_from_slice(bytes);
            } else if let Some(special) = self.special_tokens_decoder.get(token) {
                result.extend_from_slice(special.as_bytes());
            }
        }

        result
    }

    /// Decode ranks to a string, replacing invalid UTF-8 with U+FFFD.
    ///
    /// Bytes are joined before the UTF-8 conversion, so a character split
    /// across tokens decodes correctly.
    pub fn decode(&self, tokens: &[Rank]) -> String {
        String::from_utf8_lossy(&self.decode_bytes(tokens)).into_owned()
    }

    /// Decode ranks to a string, failing on invalid UTF-8.
    pub fn decode_utf8(&self, tokens: &[Rank]) -> Result<String, TokenizerError> {
        String::from_utf8(self.decode_bytes(tokens)).map_err(|_| TokenizerError::Utf8Error)
    }

    /// Batch encode multiple texts in parallel.
    pub fn encode_batch(&self, texts: &[String], allowed_special: &[&str]) -> Vec<Vec<Rank>> {
        texts
            .par_iter()
            .map(|text| self.encode(text, allowed_special))
            .collect()
    }

    /// Batch encode multiple texts with every special token allowed.
    pub fn encode_batch_with_special(&self, texts: &[String]) -> Vec<Vec<Rank>> {
        texts
            .par_iter()
            .map(|text| self.encode_with_special(text))
            .collect()
    }

    /// Batch decode multiple token lists in parallel.
    pub fn decode_batch(&self, token_lists: &[Vec<Rank>]) -> Vec<String> {
        token_lists
            .par_iter()
            .map(|tokens| self.decode(tokens))
            .collect()
    }

    /// Rank of an exact byte sequence, if it is in the vocabulary.
    pub fn rank_of(&self, bytes: &[u8]) -> Option<Rank> {
        self.trie.get_all(bytes)
    }

    /// Get the vocabulary size: the highest rank (special tokens included)
    /// plus one.
    pub fn vocab_size(&self) -> usize {
        let max_decoder_id = self.decoder.keys().max().copied();
        let max_special_id = self.special_tokens.values().max().copied();
        match max_decoder_id.max(max_special_id) {
            Some(max_id) => max_id as usize + 1,
            None => 0,
        }
    }

    /// Get the decoder map (rank -> bytes).
    pub fn decoder(&self) -> &FxHashMap<Rank, Vec<u8>> {
        &self.decoder
    }

    /// Get the special tokens map.
    pub fn special_tokens(&self) -> &FxHashMap<String, Rank> {
        &self.special_tokens
    }

    /// Get the special tokens decoder map.
    pub fn special_tokens_decoder(&self) -> &FxHashMap<Rank, String> {
        &self.special_tokens_decoder
    }

    /// The splitting pattern this tokenizer was built with.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Clear the piece cache.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.piece_cache.lock() {
            cache.clear();
        }
    }

    /// Number of pieces currently cached.
    pub fn cache_len(&self) -> usize {
        self.piece_cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Clone for Tokenizer {
    fn clone(&self) -> Self {
        // Caches are not shared between clones.
        Self {
            trie: self.trie.clone(),
            decoder: self.decoder.clone(),
            special_tokens: self.special_tokens.clone(),
            special_tokens_decoder: self.special_tokens_decoder.clone(),
            special_token_strings: self.special_token_strings.clone(),
            regex: self.regex.clone(),
            pattern: self.pattern.clone(),
            special_matcher: self.special_matcher.clone(),
            piece_cache: Mutex::new(PieceCache::new(self.cache_size)),
            cache_size: self.cache_size,
        }
    }
}
