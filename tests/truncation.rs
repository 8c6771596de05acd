//! Integration tests for budget-constrained encoding.
//!
//! Most cases use a byte-level vocabulary without merges and the `\S+|\s+`
//! splitting pattern, so every character is one token and piece boundaries are
//! easy to read off the text.

mod common;

use common::{create_byte_tokenizer, create_merging_tokenizer};
use tokentrim::{TrimmedTokens, DEFAULT_CACHE_SIZE};

fn ids(text: &str) -> Vec<u32> {
    text.bytes().map(u32::from).collect()
}

fn trimmed(ids: Vec<u32>, text: &str) -> TrimmedTokens {
    TrimmedTokens {
        ids,
        text: text.to_string(),
    }
}

#[test]
fn test_suffix_keeps_whole_pieces() {
    let tokenizer = create_byte_tokenizer(&[]);
    assert_eq!(
        tokenizer.encode_trim_suffix("ab cd", 3, &[]),
        trimmed(ids("ab "), "ab ")
    );
}

/// The piece that overflows contributes only the ranks that fit, yet the
/// returned text still spans the whole piece.
#[test]
fn test_suffix_partial_piece_consumes_whole_piece_text() {
    let tokenizer = create_byte_tokenizer(&[]);
    let result = tokenizer.encode_trim_suffix("ab cd ef", 4, &[]);

    assert_eq!(result.ids, ids("ab c"));
    assert_eq!(result.text, "ab cd");
}

#[test]
fn test_suffix_zero_budget() {
    let tokenizer = create_byte_tokenizer(&[("<end>", 300)]);
    assert_eq!(tokenizer.encode_trim_suffix("ab cd", 0, &[]), trimmed(vec![], ""));
    assert_eq!(
        tokenizer.encode_trim_suffix("<end>ab", 0, &["<end>"]),
        trimmed(vec![], "")
    );
}

#[test]
fn test_suffix_budget_covers_everything() {
    let tokenizer = create_merging_tokenizer(DEFAULT_CACHE_SIZE);
    let text = "hello world<|endoftext|>the end";
    let allowed = ["<|endoftext|>"];
    let full = tokenizer.encode(text, &allowed);

    for max_tokens in [full.len(), full.len() + 1, 1000] {
        assert_eq!(
            tokenizer.encode_trim_suffix(text, max_tokens, &allowed),
            trimmed(full.clone(), text)
        );
    }
}

#[test]
fn test_suffix_never_exceeds_budget() {
    let tokenizer = create_merging_tokenizer(DEFAULT_CACHE_SIZE);
    let text = "hello world, the world is wide<|endoftext|> and then some";
    let allowed = ["<|endoftext|>"];
    let full = tokenizer.encode(text, &allowed);

    for max_tokens in 0..=full.len() + 2 {
        let result = tokenizer.encode_trim_suffix(text, max_tokens, &allowed);
        assert!(result.ids.len() <= max_tokens, "budget {max_tokens}");
        assert!(full.starts_with(&result.ids), "budget {max_tokens}");
        assert!(text.starts_with(&result.text), "budget {max_tokens}");
    }
}

#[test]
fn test_suffix_special_token_counts_as_one() {
    let tokenizer = create_byte_tokenizer(&[("<end>", 300)]);
    let allowed = ["<end>"];

    let mut expected = ids("hi");
    expected.push(300);
    assert_eq!(
        tokenizer.encode_trim_suffix("hi<end>there", 3, &allowed),
        trimmed(expected, "hi<end>")
    );

    // The marker does not fit, so the scan stops right before it.
    assert_eq!(
        tokenizer.encode_trim_suffix("hi<end>there", 2, &allowed),
        trimmed(ids("hi"), "hi")
    );
}

#[test]
fn test_prefix_fits_unchanged() {
    let tokenizer = create_byte_tokenizer(&[]);
    assert_eq!(
        tokenizer.encode_trim_prefix("ab cd", 5, &[]),
        trimmed(ids("ab cd"), "ab cd")
    );
    assert_eq!(
        tokenizer.encode_trim_prefix("ab cd", 50, &[]),
        trimmed(ids("ab cd"), "ab cd")
    );
}

#[test]
fn test_prefix_cuts_at_piece_boundary() {
    let tokenizer = create_byte_tokenizer(&[]);
    assert_eq!(
        tokenizer.encode_trim_prefix("ab cd", 3, &[]),
        trimmed(ids(" cd"), " cd")
    );
}

/// The first boundary that drops enough tokens may drop more than needed.
#[test]
fn test_prefix_may_return_fewer_tokens() {
    let tokenizer = create_byte_tokenizer(&[]);
    assert_eq!(
        tokenizer.encode_trim_prefix("abc de", 4, &[]),
        trimmed(ids(" de"), " de")
    );
}

/// When the boundary would drop more tokens than the budget, the last
/// `max_tokens` ranks are kept verbatim and decoded.
#[test]
fn test_prefix_fallback_slices_ranks() {
    let tokenizer = create_byte_tokenizer(&[]);
    assert_eq!(
        tokenizer.encode_trim_prefix("ab cd", 2, &[]),
        trimmed(ids("cd"), "cd")
    );
    assert_eq!(
        tokenizer.encode_trim_prefix("ab cd", 1, &[]),
        trimmed(ids("d"), "d")
    );
    assert_eq!(
        tokenizer.encode_trim_prefix("abcdefgh", 3, &[]),
        trimmed(ids("fgh"), "fgh")
    );
}

#[test]
fn test_prefix_zero_budget() {
    let tokenizer = create_byte_tokenizer(&[]);
    assert_eq!(tokenizer.encode_trim_prefix("ab cd", 0, &[]), trimmed(vec![], ""));
    assert_eq!(tokenizer.encode_trim_prefix("", 0, &[]), trimmed(vec![], ""));
}

#[test]
fn test_prefix_with_special_token() {
    let tokenizer = create_byte_tokenizer(&[("<end>", 300)]);
    assert_eq!(
        tokenizer.encode_trim_prefix("hi<end>there", 5, &["<end>"]),
        trimmed(ids("there"), "there")
    );
}

/// Whatever path is taken, the result is a suffix of the full encoding and
/// never longer than the budget.
#[test]
fn test_prefix_is_suffix_of_encoding() {
    let tokenizer = create_merging_tokenizer(DEFAULT_CACHE_SIZE);
    let text = "hello world, the world is wide<|endoftext|> and then some";
    let allowed = ["<|endoftext|>"];
    let full = tokenizer.encode(text, &allowed);

    for max_tokens in 0..=full.len() + 2 {
        let result = tokenizer.encode_trim_prefix(text, max_tokens, &allowed);
        assert!(result.ids.len() <= max_tokens.min(full.len()), "budget {max_tokens}");
        assert!(full.ends_with(&result.ids), "budget {max_tokens}");
        assert_eq!(
            tokenizer.decode(&result.ids),
            result.text,
            "budget {max_tokens}"
        );
    }
}
