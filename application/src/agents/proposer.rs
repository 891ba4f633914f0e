//! Proposer role: turns a task plus feedback into a candidate script.

use crate::agents::{Agent, AgentError, MessageContext};
use crate::ports::completion::CompletionGateway;
use crate::runtime::bus::Publish;
use async_trait::async_trait;
use codeloop_domain::{
    Candidate, ConversationHistory, PipelineMessage, PipelinePrompts,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Drafts scripts with the completion collaborator, keeping its own
/// conversation history so retries see every earlier attempt.
pub struct Proposer {
    gateway: Arc<dyn CompletionGateway>,
    history: ConversationHistory,
}

impl Proposer {
    pub fn new(gateway: Arc<dyn CompletionGateway>) -> Self {
        Self {
            gateway,
            history: ConversationHistory::new(PipelinePrompts::proposer_system()),
        }
    }
}

#[async_trait]
impl Agent for Proposer {
    fn name(&self) -> &str {
        "proposer"
    }

    async fn on_message(
        &mut self,
        message: PipelineMessage,
        ctx: &MessageContext,
    ) -> Result<Vec<Publish>, AgentError> {
        let request = match message {
            PipelineMessage::Coding(request) => request,
            // Addressed to another role on this topic.
            PipelineMessage::Candidate(_)
            | PipelineMessage::Report(_)
            | PipelineMessage::Final(_) => return Ok(vec![]),
        };

        debug!(
            task = %request.task.description,
            retry = request.is_retry(),
            "Proposing candidate"
        );

        self.history.push_user(PipelinePrompts::coding_turn(
            &request.task.description,
            &request.feedback,
        ));

        let response = match self
            .gateway
            .complete(self.history.messages(), &ctx.cancellation)
            .await
        {
            Ok(text) => text,
            Err(err) if err.is_cancelled() => return Err(AgentError::Cancelled),
            Err(err) => {
                // Degrade to an empty candidate: no fences means a no-op
                // execution, and the reviewer's critique keeps the loop alive.
                warn!("Completion failed, emitting degraded candidate: {err}");
                format!("(completion failed: {err})")
            }
        };

        self.history.push_assistant(&response);

        Ok(vec![Publish::new(
            ctx.topic.clone(),
            PipelineMessage::Candidate(Candidate {
                task: request.task,
                feedback: request.feedback,
                response_text: response,
            }),
        )])
    }

    fn reset(&mut self) {
        self.history.reset();
    }
}
