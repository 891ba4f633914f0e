//! Domain layer for codeloop
//!
//! This crate contains the core pipeline entities, value objects, and pure
//! logic. It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Pipeline
//!
//! A run moves one [`Task`] through three roles until a terminal outcome:
//!
//! - **Propose**: draft a script for the task (plus any reviewer feedback)
//! - **Execute**: run the script's fenced code blocks in a sandbox
//! - **Review**: approve the result, request a retry, or give up once the
//!   retry budget is spent
//!
//! ## Messages
//!
//! Every hop between roles is a [`PipelineMessage`] variant, published to a
//! [`Topic`]. The enum is closed so each handler matches exhaustively.

pub mod code;
pub mod core;
pub mod pipeline;
pub mod prompt;
pub mod review;
pub mod session;

// Re-export commonly used types
pub use code::{CodeBlock, extract_code_blocks};
pub use crate::core::error::DomainError;
pub use pipeline::{
    Candidate, CodingRequest, ExecutionReport, FinalOutcome, PipelineMessage, ReviewVerdict, Task,
    Topic,
};
pub use prompt::PipelinePrompts;
pub use review::{ApprovalPolicy, MatchStrictness, RetryPolicy};
pub use session::{ConversationHistory, Message, Role};
