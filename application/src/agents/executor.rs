//! Executor role: runs a candidate's fenced code blocks in the sandbox.

use crate::agents::{Agent, AgentError, MessageContext};
use crate::ports::sandbox::CodeSandbox;
use crate::runtime::bus::Publish;
use async_trait::async_trait;
use codeloop_domain::{ExecutionReport, PipelineMessage, extract_code_blocks};
use std::sync::Arc;
use tracing::{debug, warn};

/// Extracts code blocks from the candidate text and executes them in order.
///
/// A candidate without fences still produces a report (empty output,
/// trivially succeeded): the reviewer must judge the non-result, otherwise
/// an empty candidate would stall the loop with no terminal message.
pub struct Executor {
    sandbox: Arc<dyn CodeSandbox>,
}

impl Executor {
    pub fn new(sandbox: Arc<dyn CodeSandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Agent for Executor {
    fn name(&self) -> &str {
        "executor"
    }

    async fn on_message(
        &mut self,
        message: PipelineMessage,
        ctx: &MessageContext,
    ) -> Result<Vec<Publish>, AgentError> {
        let candidate = match message {
            PipelineMessage::Candidate(candidate) => candidate,
            PipelineMessage::Coding(_)
            | PipelineMessage::Report(_)
            | PipelineMessage::Final(_) => return Ok(vec![]),
        };

        let blocks = extract_code_blocks(&candidate.response_text);
        debug!(
            task = %candidate.task.description,
            blocks = blocks.len(),
            "Executing candidate"
        );

        let (output, succeeded) = if blocks.is_empty() {
            (String::new(), true)
        } else {
            match self.sandbox.execute(&blocks, &ctx.cancellation).await {
                Ok(result) => (result.combined_output, result.exit_ok),
                Err(err) if err.is_cancelled() => return Err(AgentError::Cancelled),
                Err(err) => {
                    warn!("Sandbox execution failed: {err}");
                    (format!("execution failed: {err}"), false)
                }
            }
        };

        Ok(vec![Publish::new(
            ctx.topic.clone(),
            PipelineMessage::Report(ExecutionReport {
                task: candidate.task,
                response_text: candidate.response_text,
                output,
                succeeded,
            }),
        )])
    }
}
