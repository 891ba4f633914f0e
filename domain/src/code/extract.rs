//! Extraction of fenced code blocks from model responses.
//!
//! Pure text processing — no I/O. The Proposer emits the full raw response;
//! the Executor calls [`extract_code_blocks`] to recover every fenced
//! segment, in source order, with the language tag preserved (or empty when
//! the fence carries none).

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// One fenced code segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Language tag from the opening fence, empty when untagged.
    pub language: String,
    pub source: String,
}

impl CodeBlock {
    pub fn new(language: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            source: source.into(),
        }
    }
}

fn fence_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"```(?:\s*([\w\+\-]+))?\n([\s\S]*?)```").expect("fence pattern is valid")
    })
}

/// Extract all fenced code blocks from `text`, in source order.
///
/// Zero blocks is a valid result — free-text responses without a fence
/// degenerate to a no-op execution downstream, they are not an error.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    fence_pattern()
        .captures_iter(text)
        .map(|captures| CodeBlock {
            language: captures
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
            source: captures
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        })
        .collect()
}
