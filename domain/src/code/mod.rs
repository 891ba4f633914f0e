//! Fenced code block extraction

pub mod extract;

pub use extract::{CodeBlock, extract_code_blocks};
