//! Identity normalization and size metrics
//!
//! These functions never mutate stored raw values; they only derive the
//! identity keys and cached metrics persisted beside them.

/// Multiplier applied to the word count when estimating tokens
pub const TOKENS_PER_WORD: f64 = 1.3;

/// Normalize a workspace or capsule name for identity comparison:
/// trim, lowercase, collapse internal whitespace runs to single spaces.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Count Unicode scalar values, not bytes
pub fn count_chars(s: &str) -> usize {
    s.chars().count()
}

/// Whitespace-delimited word count
pub fn count_words(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Deterministic token estimate: `ceil(words * 1.3)`
pub fn estimate_tokens(s: &str) -> usize {
    let words = count_words(s);
    // Integer form of ceil(words * 13 / 10) avoids float drift on large inputs
    (words * 13).div_ceil(10)
}
