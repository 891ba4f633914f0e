//! Result sink: forwards the terminal message into the one-shot slot.

use crate::agents::{Agent, AgentError, MessageContext};
use crate::runtime::bus::Publish;
use crate::runtime::result_slot::{ResultSlot, SlotError};
use async_trait::async_trait;
use codeloop_domain::PipelineMessage;
use std::sync::Arc;
use tracing::debug;

/// Closure-style subscriber that filters the bus for the terminal message
/// and completes the pending handoff. A second terminal in one run is an
/// invariant violation and aborts the run; a terminal from a superseded run
/// is dropped.
pub struct ResultSink {
    slot: Arc<ResultSlot>,
}

impl ResultSink {
    pub fn new(slot: Arc<ResultSlot>) -> Self {
        Self { slot }
    }
}

#[async_trait]
impl Agent for ResultSink {
    fn name(&self) -> &str {
        "output_result"
    }

    async fn on_message(
        &mut self,
        message: PipelineMessage,
        ctx: &MessageContext,
    ) -> Result<Vec<Publish>, AgentError> {
        // Only the final result is of interest; everything else on the topic
        // passes through.
        let PipelineMessage::Final(outcome) = message else {
            return Ok(vec![]);
        };

        debug!(approved = outcome.is_approved(), run = ctx.run_id, "Terminal message observed");
        match self.slot.complete(ctx.run_id, outcome) {
            Ok(()) => Ok(vec![]),
            Err(err @ SlotError::AlreadyCompleted) => {
                Err(AgentError::DuplicateTerminal(err.to_string()))
            }
            Err(SlotError::StaleRun | SlotError::NotArmed) => {
                // An abandoned run finished late; its result no longer has a
                // waiting driver.
                debug!(run = ctx.run_id, "Dropping terminal from a superseded run");
                Ok(vec![])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeloop_domain::{FinalOutcome, Task, Topic};
    use tokio_util::sync::CancellationToken;

    fn ctx() -> MessageContext {
        ctx_for_run(1)
    }

    fn ctx_for_run(run_id: u64) -> MessageContext {
        MessageContext {
            topic: Topic::pipeline(),
            run_id,
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_forwards_final_into_slot() {
        let slot = Arc::new(ResultSlot::new());
        let receiver = slot.arm(1);
        let mut sink = ResultSink::new(Arc::clone(&slot));

        sink.on_message(
            PipelineMessage::Final(FinalOutcome::Approved {
                output: "hello\n".to_string(),
            }),
            &ctx(),
        )
        .await
        .unwrap();

        assert_eq!(
            receiver.await.unwrap(),
            FinalOutcome::Approved {
                output: "hello\n".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_ignores_non_terminal_messages() {
        let slot = Arc::new(ResultSlot::new());
        let _receiver = slot.arm(1);
        let mut sink = ResultSink::new(Arc::clone(&slot));

        let out = sink
            .on_message(
                PipelineMessage::Coding(codeloop_domain::CodingRequest::initial(Task::new("t"))),
                &ctx(),
            )
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_second_terminal_is_fatal() {
        let slot = Arc::new(ResultSlot::new());
        let _receiver = slot.arm(1);
        let mut sink = ResultSink::new(Arc::clone(&slot));

        let first = PipelineMessage::Final(FinalOutcome::Approved {
            output: "one".to_string(),
        });
        let second = PipelineMessage::Final(FinalOutcome::Approved {
            output: "two".to_string(),
        });

        sink.on_message(first, &ctx()).await.unwrap();
        let result = sink.on_message(second, &ctx()).await;
        assert!(matches!(result, Err(AgentError::DuplicateTerminal(_))));
    }

    #[tokio::test]
    async fn test_terminal_from_superseded_run_is_dropped() {
        let slot = Arc::new(ResultSlot::new());
        let _abandoned = slot.arm(1);
        let current = slot.arm(2);
        let mut sink = ResultSink::new(Arc::clone(&slot));

        // A late terminal from run 1 is discarded without becoming fatal.
        let out = sink
            .on_message(
                PipelineMessage::Final(FinalOutcome::Approved {
                    output: "late".to_string(),
                }),
                &ctx_for_run(1),
            )
            .await
            .unwrap();
        assert!(out.is_empty());

        // The current run still completes normally.
        sink.on_message(
            PipelineMessage::Final(FinalOutcome::Approved {
                output: "fresh".to_string(),
            }),
            &ctx_for_run(2),
        )
        .await
        .unwrap();
        assert_eq!(
            current.await.unwrap(),
            FinalOutcome::Approved {
                output: "fresh".to_string()
            }
        );
    }
}
