//! UTF-8 safe incremental decoding.
//!
//! Token boundaries need not fall on character boundaries, so decoding one
//! token at a time can leave half a character pending. [`StreamingDecoder`]
//! holds such trailing bytes back until the rest of the character arrives.

use super::tokenizer::Tokenizer;
use super::Rank;

/// A streaming decoder that handles incomplete UTF-8 sequences across token
/// boundaries.
///
/// # Example
///
/// ```ignore
/// let mut decoder = StreamingDecoder::new(&tokenizer);
///
/// for token_id in token_stream {
///     if let Some(text) = decoder.add_token(token_id) {
///         print!("{}", text);
///     }
/// }
/// print!("{}", decoder.flush());
/// ```
pub struct StreamingDecoder<'a> {
    tokenizer: &'a Tokenizer,
    buffer: Vec<u8>,
}

impl<'a> StreamingDecoder<'a> {
    /// Create a new streaming decoder for the given tokenizer.
    pub fn new(tokenizer: &'a Tokenizer) -> Self {
        Self {
            tokenizer,
            buffer: Vec::with_capacity(16),
        }
    }

    /// Append the bytes of one rank. Unknown ranks add nothing.
    fn push(&mut self, token_id: Rank) {
        if let Some(bytes) = self.tokenizer.decoder().get(&token_id) {
            self.buffer.extend_from_slice(bytes);
        } else if let Some(special) = self.tokenizer.special_tokens_decoder().get(&token_id) {
            self.buffer.extend_from_slice(special.as_bytes());
        }
    }

    /// Add a token and return any complete UTF-8 characters.
    ///
    /// Returns `None` while the buffered bytes do not yet form a character.
    pub fn add_token(&mut self, token_id: Rank) -> Option<String> {
        self.push(token_id);
        self.take_complete()
    }

    /// Add multiple tokens at once and return complete UTF-8 characters.
    pub fn add_tokens(&mut self, token_ids: &[Rank]) -> Option<String> {
        for &token_id in token_ids {
            self.push(token_id);
        }
        self.take_complete()
    }

    /// Flush any remaining buffered bytes.
    ///
    /// An incomplete trailing sequence comes out as U+FFFD.
    pub fn flush(&mut self) -> String {
        let result = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        result
    }

    /// Reset the decoder state, discarding any buffered bytes.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Check if there are buffered bytes waiting for completion.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Get the number of pending bytes in the buffer.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Drain everything up to a possibly incomplete trailing sequence.
    ///
    /// Invalid bytes in the middle of the buffer can never complete and are
    /// emitted as U+FFFD.
    fn take_complete(&mut self) -> Option<String> {
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.buffer) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.buffer.clear();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    // `from_utf8` already accepted this prefix.
                    out.push_str(&String::from_utf8_lossy(&self.buffer[..valid_up_to]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.buffer.drain(..valid_up_to + bad);
                        }
                        None => {
                            self.buffer.drain(..valid_up_to);
                            break;
                        }
                    }
                }
            }
        }

        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}
