//! Named encoding presets.
//!
//! A preset bundles what a tokenizer needs besides the vocabulary itself: the
//! splitting pattern and the special-token table. Vocabulary files are never
//! bundled; pair a preset with a `.tiktoken` file through
//! [`Tokenizer::from_encoding_file`](super::Tokenizer::from_encoding_file).
//!
//! - `r50k_base` / `gpt2` - GPT-2 and GPT-3 era models
//! - `p50k_base` - Codex era models
//! - `p50k_edit` - `p50k_base` plus fill-in-the-middle markers
//! - `cl100k_base` - GPT-4, GPT-3.5-turbo
//! - `o200k_base` - GPT-4o

use rustc_hash::FxHashMap;

use super::Rank;

pub const ENDOFTEXT: &str = "<|endoftext|>";
pub const FIM_PREFIX: &str = "<|fim_prefix|>";
pub const FIM_MIDDLE: &str = "<|fim_middle|>";
pub const FIM_SUFFIX: &str = "<|fim_suffix|>";
pub const ENDOFPROMPT: &str = "<|endofprompt|>";

/// Splitting pattern shared by r50k_base and the p50k encodings.
pub const R50K_BASE_PATTERN: &str =
    r"'(?:[sdmt]|ll|ve|re)| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// Splitting pattern for cl100k_base (GPT-4, GPT-3.5-turbo).
pub const CL100K_BASE_PATTERN: &str = r"(?i:'s|'t|'re|'ve|'m|'ll|'d)|[^\r\n\p{L}\p{N}]?\p{L}+|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// Splitting pattern for o200k_base (GPT-4o).
pub const O200K_BASE_PATTERN: &str = r"[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]*[\p{Ll}\p{Lm}\p{Lo}\p{M}]+(?i:'s|'t|'re|'ve|'m|'ll|'d)?|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]+[\p{Ll}\p{Lm}\p{Lo}\p{M}]*(?i:'s|'t|'re|'ve|'m|'ll|'d)?|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// Supported encoding presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    R50kBase,
    P50kBase,
    P50kEdit,
    Cl100kBase,
    O200kBase,
}

impl Encoding {
    /// Parse an encoding name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "r50k_base" | "gpt2" => Some(Self::R50kBase),
            "p50k_base" => Some(Self::P50kBase),
            "p50k_edit" => Some(Self::P50kEdit),
            "cl100k_base" => Some(Self::Cl100kBase),
            "o200k_base" => Some(Self::O200kBase),
            _ => None,
        }
    }

    /// Canonical name of the encoding.
    pub fn name(self) -> &'static str {
        match self {
            Self::R50kBase => "r50k_base",
            Self::P50kBase => "p50k_base",
            Self::P50kEdit => "p50k_edit",
            Self::Cl100kBase => "cl100k_base",
            Self::O200kBase => "o200k_base",
        }
    }

    /// All names accepted by [`Encoding::from_name`].
    pub fn supported_names() -> &'static [&'static str] {
        &[
            "r50k_base",
            "gpt2",
            "p50k_base",
            "p50k_edit",
            "cl100k_base",
            "o200k_base",
        ]
    }

    /// Splitting pattern used to cut text into pieces.
    pub fn pattern(self) -> &'static str {
        match self {
            Self::R50kBase | Self::P50kBase | Self::P50kEdit => R50K_BASE_PATTERN,
            Self::Cl100kBase => CL100K_BASE_PATTERN,
            Self::O200kBase => O200K_BASE_PATTERN,
        }
    }

    /// Special-token table of the encoding.
    pub fn special_tokens(self) -> FxHashMap<String, Rank> {
        let table: &[(&str, Rank)] = match self {
            Self::R50kBase | Self::P50kBase => &[(ENDOFTEXT, 50256)],
            Self::P50kEdit => &[
                (ENDOFTEXT, 50256),
                (FIM_PREFIX, 50281),
                (FIM_MIDDLE, 50282),
                (FIM_SUFFIX, 50283),
            ],
            Self::Cl100kBase => &[
                (ENDOFTEXT, 100257),
                (FIM_PREFIX, 100258),
                (FIM_MIDDLE, 100259),
                (FIM_SUFFIX, 100260),
                (ENDOFPROMPT, 100276),
            ],
            Self::O200kBase => &[(ENDOFTEXT, 199999), (ENDOFPROMPT, 200018)],
        };

        table
            .iter()
            .map(|&(token, rank)| (token.to_string(), rank))
            .collect()
    }
}
