//! Vocabulary loading utilities for the tiktoken BPE format.
//!
//! Each non-blank line holds exactly two whitespace-separated fields: a
//! base64-encoded byte sequence and its decimal rank.
//!
//! ```text
//! SGVsbG8= 0
//! V29ybGQ= 1
//! IQ== 2
//! ```
//!
//! Lower ranks merge first. The mapping must be a bijection: two byte
//! sequences sharing a rank, or one sequence listed under two ranks, make the
//! forward and reverse views differ in size and the vocabulary is rejected.

use base64::{engine::general_purpose::STANDARD, Engine};
use rustc_hash::FxHashMap;
use std::path::Path;
use thiserror::Error;

use super::Rank;

/// Forward (bytes → rank) and reverse (rank → bytes) vocabulary views.
pub type EncoderDecoderPair = (FxHashMap<Vec<u8>, Rank>, FxHashMap<Rank, Vec<u8>>);

/// Errors that can occur when loading or validating a vocabulary.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("Invalid base64 encoding: {0}")]
    Base64Error(#[from] base64::DecodeError),
    #[error("Invalid line format: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Vocabulary is not a bijection: {encoder} byte sequences but {decoder} ranks")]
    SizeMismatch { encoder: usize, decoder: usize },
}

/// Parse one `<base64> <rank>` record.
fn parse_record(line_no: usize, line: &str) -> Result<(Vec<u8>, Rank), VocabError> {
    let mut fields = line.split_whitespace();
    let (Some(token_b64), Some(rank_str), None) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(VocabError::ParseError(format!(
            "line {line_no}: expected `<base64> <rank>`, got {line:?}"
        )));
    };

    let token = STANDARD.decode(token_b64)?;
    let rank: Rank = rank_str
        .parse()
        .map_err(|_| VocabError::ParseError(format!("line {line_no}: invalid rank {rank_str:?}")))?;

    Ok((token, rank))
}

/// Load a tiktoken BPE vocabulary from raw bytes, building both views.
///
/// Blank lines are skipped; any other malformed line is an error, as is a
/// vocabulary whose two views end up with different sizes.
pub fn load_tiktoken_bpe(data: &[u8]) -> Result<EncoderDecoderPair, VocabError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| VocabError::ParseError(format!("vocabulary is not UTF-8: {e}")))?;

    let mut encoder = FxHashMap::default();
    let mut decoder = FxHashMap::default();

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let (token, rank) = parse_record(idx + 1, line)?;
        decoder.insert(rank, token.clone());
        encoder.insert(token, rank);
    }

    check_bijection(&encoder, &decoder)?;
    log::debug!("loaded tiktoken vocabulary with {} entries", encoder.len());

    Ok((encoder, decoder))
}

/// Load a tiktoken BPE vocabulary from a file path.
pub fn load_tiktoken_bpe_file<P: AsRef<Path>>(path: P) -> Result<EncoderDecoderPair, VocabError> {
    let data = std::fs::read(path)?;
    load_tiktoken_bpe(&data)
}

/// Build a decoder map (rank → bytes) from an encoder map (bytes → rank).
///
/// Ranks shared by several byte sequences collapse to one decoder entry; run
/// [`check_bijection`] on the result to catch that.
pub fn build_decoder(encoder: &FxHashMap<Vec<u8>, Rank>) -> FxHashMap<Rank, Vec<u8>> {
    encoder.iter().map(|(k, v)| (*v, k.clone())).collect()
}

/// Reject vocabularies whose forward and reverse views differ in size.
pub fn check_bijection(
    encoder: &FxHashMap<Vec<u8>, Rank>,
    decoder: &FxHashMap<Rank, Vec<u8>>,
) -> Result<(), VocabError> {
    if encoder.len() != decoder.len() {
        return Err(VocabError::SizeMismatch {
            encoder: encoder.len(),
            decoder: decoder.len(),
        });
    }
    Ok(())
}
