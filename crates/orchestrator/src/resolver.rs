//! Output resolution — turning generated text back into a structured value.
//!
//! The raw text is sanitized first. If a JSON object or array can be found
//! in it, that value is the result. Otherwise the sanitized text, cut to
//! [`FREE_TEXT_WORD_LIMIT`] words, is wrapped in a fallback envelope.
//! Malformed output is never an error.

use chrono::Utc;
use serde_json::{Value, json};
use tracing::debug;

pub const FREE_TEXT_WORD_LIMIT: usize = 180;

/// Lines starting with any of these (case-insensitive) are model chatter or
/// echoed prompt headers.
const LEAKAGE_PREFIXES: &[&str] = &[
    "your task:",
    "output format:",
    "instructions:",
    "hmm",
    "let me think",
    "let me analyze",
    "thinking:",
];

fn sanitize_pass(text: &str) -> String {
    let kept: Vec<String> = text
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.starts_with("```") {
                return None;
            }
            let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
            if collapsed.is_empty() {
                return None;
            }
            let lower = collapsed.to_lowercase();
            if LEAKAGE_PREFIXES.iter().any(|p| lower.starts_with(p)) {
                return None;
            }
            Some(collapsed)
        })
        .collect();

    kept.join("\n")
        .trim_matches(|c: char| c.is_whitespace() || c == '`')
        .to_string()
}

/// Strip fences, leaked instructions, blank lines and extra whitespace.
///
/// Passes repeat until the text stops changing, so
/// `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(raw: &str) -> String {
    let mut current = sanitize_pass(raw);
    loop {
        let next = sanitize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Keep at most `limit` whitespace-separated words, preserving the original
/// spacing of the kept part.
pub fn truncate_words(text: &str, limit: usize) -> String {
    let mut words = 0usize;
    let mut in_word = false;
    for (idx, c) in text.char_indices() {
        if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            in_word = true;
            words += 1;
            if words > limit {
                return text[..idx].trim_end().to_string();
            }
        }
    }
    text.to_string()
}

/// Find the first balanced `{...}` or `[...]` in `text` that parses as a
/// JSON object or array.
///
/// Only delimiters of the opening kind are counted, and brackets inside
/// string literals count too. A candidate that is unbalanced or does not
/// parse is skipped, and the search resumes just after its opening
/// delimiter.
pub fn extract_structured(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut from = 0usize;

    while let Some(offset) = text[from..].find(['{', '[']) {
        let start = from + offset;
        let open = bytes[start];
        let close = if open == b'{' { b'}' } else { b']' };

        let mut depth = 0usize;
        let mut end = None;
        for (i, &b) in bytes[start..].iter().enumerate() {
            if b == open {
                depth += 1;
            } else if b == close {
                depth -= 1;
                if depth == 0 {
                    end = Some(start + i);
                    break;
                }
            }
        }

        if let Some(end) = end
            && let Ok(value) = serde_json::from_str::<Value>(&text[start..=end])
            && (value.is_object() || value.is_array())
        {
            return Some(value);
        }
        from = start + 1;
    }

    None
}

/// The outcome of resolving one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub data: Value,
    /// `false` when the fallback envelope was used
    pub structured: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OutputResolver;

impl OutputResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, raw: &str, tool_name: &str, arguments: &Value) -> Resolved {
        let sanitized = sanitize(raw);

        if let Some(data) = extract_structured(&sanitized) {
            return Resolved {
                data,
                structured: true,
            };
        }

        debug!(
            tool = tool_name,
            chars = sanitized.len(),
            "No structured value in output, using free-text envelope"
        );
        Resolved {
            data: json!({
                "result": truncate_words(&sanitized, FREE_TEXT_WORD_LIMIT),
                "tool": tool_name,
                "arguments": arguments,
                "timestamp": Utc::now().to_rfc3339(),
            }),
            structured: false,
        }
    }
}
