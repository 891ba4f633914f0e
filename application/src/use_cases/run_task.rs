//! The RunTask use case: wire the pipeline and drive one task to a terminal
//! outcome.

use crate::agents::{Executor, Proposer, ResultSink, Reviewer};
use crate::ports::completion::CompletionGateway;
use crate::ports::sandbox::CodeSandbox;
use crate::runtime::bus::Publish;
use crate::runtime::driver::{PipelineRuntime, RunError};
use crate::runtime::registry::AgentRegistry;
use crate::runtime::result_slot::ResultSlot;
use codeloop_domain::{
    ApprovalPolicy, CodingRequest, DomainError, FinalOutcome, PipelineMessage, RetryPolicy, Task,
    Topic,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Role identifiers, also the worker names in logs.
const PROPOSER: &str = "proposer";
const EXECUTOR: &str = "executor";
const REVIEWER: &str = "reviewer";
const OUTPUT_RESULT: &str = "output_result";

/// Tunables for one pipeline instance
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub retry: RetryPolicy,
    pub approval: ApprovalPolicy,
    /// Overall deadline per run, so a dropped turn can never hang the caller.
    pub run_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            approval: ApprovalPolicy::default(),
            run_timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Error, Debug)]
pub enum RunTaskError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Run(#[from] RunError),
}

#[derive(Debug, Clone)]
pub struct RunTaskOutput {
    pub outcome: FinalOutcome,
    pub elapsed: Duration,
}

/// Drives the propose→execute→review loop for user tasks.
///
/// The runtime and its agent instances live as long as the use case, so
/// conversation histories accumulate across tasks until [`reset`] is called
/// — mirroring an interactive session. Sandbox working-directory scoping is
/// the sandbox adapter's concern: one adapter instance, one directory.
///
/// [`reset`]: RunTaskUseCase::reset
pub struct RunTaskUseCase {
    runtime: PipelineRuntime,
    settings: PipelineSettings,
}

impl RunTaskUseCase {
    pub fn new(
        gateway: Arc<dyn CompletionGateway>,
        sandbox: Arc<dyn CodeSandbox>,
        settings: PipelineSettings,
    ) -> Result<Self, RunTaskError> {
        Self::with_cancellation(gateway, sandbox, settings, CancellationToken::new())
    }

    pub fn with_cancellation(
        gateway: Arc<dyn CompletionGateway>,
        sandbox: Arc<dyn CodeSandbox>,
        settings: PipelineSettings,
        cancellation: CancellationToken,
    ) -> Result<Self, RunTaskError> {
        let mut registry = AgentRegistry::new();

        {
            let gateway = Arc::clone(&gateway);
            registry.register(PROPOSER, move || Box::new(Proposer::new(Arc::clone(&gateway))));
        }
        {
            let sandbox = Arc::clone(&sandbox);
            registry.register(EXECUTOR, move || Box::new(Executor::new(Arc::clone(&sandbox))));
        }
        {
            let gateway = Arc::clone(&gateway);
            let approval = settings.approval.clone();
            let retry = settings.retry;
            registry.register(REVIEWER, move || {
                Box::new(Reviewer::new(
                    Arc::clone(&gateway),
                    approval.clone(),
                    retry,
                ))
            });
        }

        let slot = Arc::new(ResultSlot::new());
        {
            let slot = Arc::clone(&slot);
            registry.register(OUTPUT_RESULT, move || {
                Box::new(ResultSink::new(Arc::clone(&slot)))
            });
        }

        // Every role listens on the pipeline topic and matches the variants
        // it handles.
        let subscriptions: Vec<(String, Topic)> = [PROPOSER, EXECUTOR, REVIEWER, OUTPUT_RESULT]
            .iter()
            .map(|id| (id.to_string(), Topic::pipeline()))
            .collect();

        let runtime = PipelineRuntime::start(&registry, &subscriptions, slot, cancellation)?;
        Ok(Self { runtime, settings })
    }

    /// Run one task end to end.
    pub async fn execute(&self, description: &str) -> Result<RunTaskOutput, RunTaskError> {
        let task = Task::try_new(description)?;

        info!("Running task: {}", task.description);
        let started = Instant::now();
        let initial = Publish::pipeline(PipelineMessage::Coding(CodingRequest::initial(task)));

        let outcome = self.runtime.run(initial, self.settings.run_timeout).await?;
        Ok(RunTaskOutput {
            outcome,
            elapsed: started.elapsed(),
        })
    }

    /// Clear every agent's conversation history without tearing down the
    /// pipeline (the REPL `reset` command).
    pub async fn reset(&self) {
        self.runtime.reset().await;
    }

    /// Signal used to cancel in-flight runs from outside.
    pub fn cancellation(&self) -> &CancellationToken {
        self.runtime.cancellation()
    }

    /// Stop the pipeline workers.
    pub async fn shutdown(self) {
        self.runtime.shutdown().await;
    }
}
