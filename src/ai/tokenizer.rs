//! Token Estimation
//!
//! Approximate token counting for sizing decisions: whether a manuscript
//! needs chunking, and whether an aggregation prompt fits a provider's
//! context window. Uses the conservative 4-chars-per-token heuristic for
//! English prose; exact tokenizer parity is not required because every
//! consumer leaves headroom.

use crate::constants::tokens::CHARS_PER_TOKEN;

/// Estimate token count for a string (1 token ≈ 4 characters)
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Check if text fits within a token budget
pub fn fits_budget(text: &str, budget: usize) -> bool {
    estimate_tokens(text) <= budget
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_empty() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_rounds_up() {
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_estimate_counts_chars_not_bytes() {
        // 4 multibyte chars = 1 token
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn test_fits_budget() {
        let text = "a".repeat(2_000);
        assert!(fits_budget(&text, 500));
        assert!(!fits_budget(&text, 499));
    }
}
