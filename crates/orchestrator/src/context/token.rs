//! Token estimation.
//!
//! Character-based heuristic: ~4 characters per token, rounded up. Good
//! enough for usage accounting; the backend never reports real counts.

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Tokens charged for one backend call: prompt plus raw output.
pub fn call_tokens(prompt: &str, output: &str) -> u64 {
    (prompt.chars().count() as u64 + output.chars().count() as u64).div_ceil(4)
}
