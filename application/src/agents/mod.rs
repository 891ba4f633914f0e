//! Pipeline agents
//!
//! Every role implements the same contract: handle one message, optionally
//! return follow-up messages to publish. A handler runs single-threaded with
//! respect to its own agent, so role state (history, attempt counter) is
//! owned exclusively and mutated without locks.

pub mod executor;
pub mod proposer;
pub mod reviewer;
pub mod sink;

pub use executor::Executor;
pub use proposer::Proposer;
pub use reviewer::Reviewer;
pub use sink::ResultSink;

use crate::runtime::bus::Publish;
use async_trait::async_trait;
use codeloop_domain::{PipelineMessage, Topic};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Delivery context handed to each handler invocation
#[derive(Debug, Clone)]
pub struct MessageContext {
    /// Topic the message was delivered on.
    pub topic: Topic,
    /// Identifies the run this delivery belongs to; late messages from an
    /// abandoned run keep their original id.
    pub run_id: u64,
    /// Run-scoped cancellation signal; propagate it into collaborator calls.
    pub cancellation: CancellationToken,
}

/// Errors a handler can surface to the runtime
///
/// Collaborator failures are normally absorbed inside the role as degraded
/// messages; only cancellation and invariant violations escape the handler
/// boundary.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The run was cancelled while this handler was in flight.
    #[error("Cancelled")]
    Cancelled,

    /// A second terminal message was produced for one run. Fatal: the run
    /// aborts rather than corrupt the result handoff.
    #[error("Duplicate terminal message: {0}")]
    DuplicateTerminal(String),

    /// Unrecoverable handler failure; the message is logged and dropped.
    #[error("{0}")]
    Failed(String),
}

/// Shared contract for all pipeline roles
#[async_trait]
pub trait Agent: Send {
    /// Role name, used for logging.
    fn name(&self) -> &str;

    /// Handle one delivered message; the returned list is published next.
    /// An empty list ends this turn.
    async fn on_message(
        &mut self,
        message: PipelineMessage,
        ctx: &MessageContext,
    ) -> Result<Vec<Publish>, AgentError>;

    /// Clear conversation state without tearing the agent down (the REPL
    /// `reset` command). Stateless roles keep the default no-op.
    fn reset(&mut self) {}
}
