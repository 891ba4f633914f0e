//! Code sandbox port
//!
//! Defines the interface for the code-execution collaborator. The adapter
//! owns the scoped working directory: fresh per pipeline, shared across the
//! attempts of that pipeline's runs so files from earlier attempts stay
//! visible, never shared between unrelated pipelines.

use async_trait::async_trait;
use codeloop_domain::CodeBlock;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that can occur while executing code blocks
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Failed to spawn interpreter: {0}")]
    Spawn(String),

    #[error("Execution timed out after {0} seconds")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cancelled")]
    Cancelled,
}

impl SandboxError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SandboxError::Cancelled)
    }
}

/// Result of executing a sequence of code blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Concatenated stdout/stderr of every executed block.
    pub combined_output: String,
    /// True iff every block exited successfully.
    pub exit_ok: bool,
}

/// Collaborator that runs code blocks in a scoped working directory
#[async_trait]
pub trait CodeSandbox: Send + Sync {
    /// Execute the blocks in order and return their combined output.
    async fn execute(
        &self,
        blocks: &[CodeBlock],
        cancellation: &CancellationToken,
    ) -> Result<ExecutionResult, SandboxError>;
}
