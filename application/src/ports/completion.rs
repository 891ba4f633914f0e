//! Completion gateway port
//!
//! Defines the interface for the LLM collaborator. Agents own their
//! conversation histories, so the gateway is stateless: each call carries
//! the full ordered history.

use async_trait::async_trait;
use codeloop_domain::Message;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that can occur during completion gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Timeout")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,
}

impl GatewayError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GatewayError::Cancelled)
    }
}

/// Gateway to the completion collaborator
///
/// Transient failures (rate limits, flaky transport) are retried inside the
/// adapter; the pipeline only sees the final error, which the roles convert
/// into degraded messages rather than crashes.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Complete the conversation, returning the assistant's text response.
    async fn complete(
        &self,
        history: &[Message],
        cancellation: &CancellationToken,
    ) -> Result<String, GatewayError>;
}
