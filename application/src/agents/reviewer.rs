//! Reviewer role: judges execution reports and owns the retry budget.

use crate::agents::{Agent, AgentError, MessageContext};
use crate::ports::completion::CompletionGateway;
use crate::runtime::bus::Publish;
use async_trait::async_trait;
use codeloop_domain::{
    ApprovalPolicy, CodingRequest, ConversationHistory, ExecutionReport, FinalOutcome,
    PipelineMessage, PipelinePrompts, RetryPolicy, ReviewVerdict, Task,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reviews each execution report and decides approve / retry / give up.
///
/// The attempt counter is owned exclusively by this instance. It increments
/// only on non-approval, and it resets both when a terminal verdict closes
/// the current run and when a report carries a different task than the
/// previous one, so every run starts with the full budget even when the same
/// description is submitted twice. An always-rejecting collaborator yields a
/// terminal message after exactly `max_attempts + 1` review turns.
pub struct Reviewer {
    gateway: Arc<dyn CompletionGateway>,
    history: ConversationHistory,
    approval: ApprovalPolicy,
    retry: RetryPolicy,
    attempts: u32,
    current_task: Option<Task>,
}

impl Reviewer {
    pub fn new(
        gateway: Arc<dyn CompletionGateway>,
        approval: ApprovalPolicy,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gateway,
            history: ConversationHistory::new(PipelinePrompts::reviewer_system()),
            approval,
            retry,
            attempts: 0,
            current_task: None,
        }
    }

    /// Non-approvals seen for the current run.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn judge(&mut self, response: &str, report: &ExecutionReport) -> ReviewVerdict {
        if self.approval.is_approval(response) {
            return ReviewVerdict::Approved {
                output: report.output.clone(),
            };
        }

        self.attempts += 1;
        if self.retry.is_exhausted(self.attempts) {
            ReviewVerdict::GaveUp {
                last_output: report.output.clone(),
            }
        } else {
            ReviewVerdict::Retry {
                feedback: response.to_string(),
            }
        }
    }

    /// A terminal verdict ends the run. Re-running the same task later must
    /// start with the full retry budget again.
    fn close_run(&mut self) {
        self.attempts = 0;
        self.current_task = None;
    }
}

#[async_trait]
impl Agent for Reviewer {
    fn name(&self) -> &str {
        "reviewer"
    }

    async fn on_message(
        &mut self,
        message: PipelineMessage,
        ctx: &MessageContext,
    ) -> Result<Vec<Publish>, AgentError> {
        let report = match message {
            PipelineMessage::Report(report) => report,
            PipelineMessage::Coding(_)
            | PipelineMessage::Candidate(_)
            | PipelineMessage::Final(_) => return Ok(vec![]),
        };

        // New correlation key means a new run: fresh counter.
        if self.current_task.as_ref() != Some(&report.task) {
            self.current_task = Some(report.task.clone());
            self.attempts = 0;
        }

        self.history.push_user(PipelinePrompts::review_turn(&report));

        let response = match self
            .gateway
            .complete(self.history.messages(), &ctx.cancellation)
            .await
        {
            Ok(text) => text,
            Err(err) if err.is_cancelled() => return Err(AgentError::Cancelled),
            Err(err) => {
                // An unreachable reviewer model is a non-approval; the error
                // text doubles as feedback so the next attempt can react.
                warn!("Review completion failed, treating as non-approval: {err}");
                format!("(review failed: {err})")
            }
        };

        self.history.push_assistant(&response);

        let verdict = self.judge(&response, &report);
        debug!(
            task = %report.task.description,
            attempts = self.attempts,
            verdict = match &verdict {
                ReviewVerdict::Approved { .. } => "approved",
                ReviewVerdict::Retry { .. } => "retry",
                ReviewVerdict::GaveUp { .. } => "gave_up",
            },
            "Review verdict"
        );

        let next = match verdict {
            ReviewVerdict::Approved { output } => {
                info!(task = %report.task.description, "Result approved");
                self.close_run();
                PipelineMessage::Final(FinalOutcome::Approved { output })
            }
            ReviewVerdict::GaveUp { last_output } => {
                info!(
                    task = %report.task.description,
                    max_attempts = self.retry.max_attempts,
                    "Retry budget exhausted"
                );
                self.close_run();
                PipelineMessage::Final(FinalOutcome::GaveUp {
                    message: self.retry.gave_up_message(),
                    last_output,
                })
            }
            ReviewVerdict::Retry { feedback } => {
                PipelineMessage::Coding(CodingRequest::retry(report.task, feedback))
            }
        };

        Ok(vec![Publish::new(ctx.topic.clone(), next)])
    }

    fn reset(&mut self) {
        self.history.reset();
        self.attempts = 0;
        self.current_task = None;
    }
}
