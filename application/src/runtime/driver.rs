//! Pipeline runtime driver.
//!
//! Spawns one worker task per registered agent, publishes the initial
//! message, and waits for either the terminal result, quiescence without a
//! terminal, the overall timeout, or cancellation — each surfaced as a
//! distinct outcome so the caller never observes a silent hang.

use crate::agents::{AgentError, MessageContext};
use crate::runtime::bus::{Envelope, InFlightTracker, MessageBus, Publish, RunHandle};
use crate::runtime::registry::AgentRegistry;
use crate::runtime::result_slot::ResultSlot;
use codeloop_domain::FinalOutcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Worker inbox capacity. Small: the pipeline has one message in flight per
/// hop, the bound exists to catch runaway publish loops.
const INBOX_CAPACITY: usize = 64;

/// Driver-level run failures, all distinguishable by the caller
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Run cancelled")]
    Cancelled,

    #[error("Run timed out after {0:?}")]
    Timeout(Duration),

    #[error("Runtime became idle without producing a terminal message")]
    NoTerminalResult,

    #[error("Duplicate terminal message: {0}")]
    DuplicateTerminal(String),

    #[error("Agent role not registered: {0}")]
    UnknownAgent(String),
}

/// The actor runtime: bus, workers, and the one-shot result handoff
pub struct PipelineRuntime {
    bus: Arc<MessageBus>,
    tracker: Arc<InFlightTracker>,
    slot: Arc<ResultSlot>,
    cancellation: CancellationToken,
    fatal: Arc<Mutex<Option<RunError>>>,
    run_counter: AtomicU64,
    workers: Vec<JoinHandle<()>>,
}

impl PipelineRuntime {
    /// Resolve every agent named in `subscriptions` from the registry and
    /// spawn its worker. Subscriptions are static from here on.
    pub fn start(
        registry: &AgentRegistry,
        subscriptions: &[(String, codeloop_domain::Topic)],
        slot: Arc<ResultSlot>,
        cancellation: CancellationToken,
    ) -> Result<Self, RunError> {
        let tracker = Arc::new(InFlightTracker::new());
        let mut bus = MessageBus::new(Arc::clone(&tracker));
        let fatal = Arc::new(Mutex::new(None));

        // Resolve each role once; the instance is memoized inside its worker
        // for the runtime's lifetime.
        let mut pending = Vec::new();
        for type_id in registry.type_ids() {
            let agent = registry
                .resolve(type_id)
                .ok_or_else(|| RunError::UnknownAgent(type_id.to_string()))?;
            let (sender, receiver) = mpsc::channel(INBOX_CAPACITY);
            bus.attach(type_id, sender);
            pending.push((type_id.to_string(), agent, receiver));
        }

        for (type_id, topic) in subscriptions {
            if !registry.is_registered(type_id) {
                return Err(RunError::UnknownAgent(type_id.clone()));
            }
            bus.subscribe(type_id, topic.clone());
        }

        let bus = Arc::new(bus);
        let workers = pending
            .into_iter()
            .map(|(id, agent, receiver)| {
                tokio::spawn(agent_worker(
                    id,
                    agent,
                    receiver,
                    Arc::clone(&bus),
                    Arc::clone(&tracker),
                    cancellation.clone(),
                    Arc::clone(&fatal),
                ))
            })
            .collect();

        Ok(Self {
            bus,
            tracker,
            slot,
            cancellation,
            fatal,
            run_counter: AtomicU64::new(0),
            workers,
        })
    }

    /// Drive one run to its terminal outcome.
    ///
    /// Publishes `initial`, waits for quiescence, then drains the result
    /// slot. Resolves early on cancellation or when `timeout` elapses. Each
    /// run gets its own id and a child of the runtime token; abandoning the
    /// run cancels only that child, so in-flight handlers stop without
    /// taking the workers down, and anything they still publish is tagged
    /// with the superseded id and discarded.
    pub async fn run(
        &self,
        initial: Publish,
        timeout: Duration,
    ) -> Result<FinalOutcome, RunError> {
        let run_id = self.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let run = RunHandle {
            id: run_id,
            cancellation: self.cancellation.child_token(),
        };
        // A fatal left behind by an abandoned run belongs to that run.
        let _ = self.take_fatal();
        let mut receiver = self.slot.arm(run_id);
        info!(run = run_id, topic = %initial.topic, kind = initial.message.kind(), "Starting run");

        let publish_and_settle = async {
            self.bus.publish(&initial.topic, initial.message, &run).await;
            self.tracker.wait_idle().await;
        };

        tokio::select! {
            biased;
            _ = run.cancellation.cancelled() => {
                Err(self.take_fatal().unwrap_or(RunError::Cancelled))
            }
            _ = tokio::time::sleep(timeout) => {
                debug!(run = run_id, ?timeout, "Run deadline elapsed");
                run.cancellation.cancel();
                Err(RunError::Timeout(timeout))
            }
            _ = publish_and_settle => {
                if let Some(fatal) = self.take_fatal() {
                    return Err(fatal);
                }
                // At quiescence the sink has either completed the slot or
                // nothing terminal was ever produced.
                match receiver.try_recv() {
                    Ok(outcome) => Ok(outcome),
                    Err(_) => {
                        run.cancellation.cancel();
                        Err(RunError::NoTerminalResult)
                    }
                }
            }
        }
    }

    /// Clear every agent's conversation state without stopping the workers.
    pub async fn reset(&self) {
        self.bus.broadcast_reset().await;
        self.tracker.wait_idle().await;
    }

    /// Runtime-wide cancellation signal. Every run's token is a child of
    /// this one, so cancelling it stops the current run and the workers.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Stop all workers. Handlers stuck in a collaborator call are aborted.
    pub async fn shutdown(self) {
        self.cancellation.cancel();
        for worker in &self.workers {
            worker.abort();
        }
        let _ = futures::future::join_all(self.workers).await;
    }

    fn take_fatal(&self) -> Option<RunError> {
        self.fatal.lock().expect("fatal slot lock poisoned").take()
    }
}

/// One worker owns one agent instance and handles its inbox serially.
async fn agent_worker(
    id: String,
    mut agent: Box<dyn crate::agents::Agent>,
    mut inbox: mpsc::Receiver<Envelope>,
    bus: Arc<MessageBus>,
    tracker: Arc<InFlightTracker>,
    cancellation: CancellationToken,
    fatal: Arc<Mutex<Option<RunError>>>,
) {
    loop {
        let envelope = tokio::select! {
            biased;
            _ = cancellation.cancelled() => break,
            received = inbox.recv() => match received {
                Some(envelope) => envelope,
                None => break,
            },
        };

        match envelope {
            Envelope::Reset => {
                debug!(agent = %id, "Resetting agent state");
                agent.reset();
                tracker.completed();
            }
            Envelope::Deliver { topic, message, run } => {
                let kind = message.kind();
                let ctx = MessageContext {
                    topic,
                    run_id: run.id,
                    cancellation: run.cancellation.clone(),
                };

                match agent.on_message(message, &ctx).await {
                    Ok(outgoing) => {
                        for publish in outgoing {
                            bus.publish(&publish.topic, publish.message, &run).await;
                        }
                    }
                    Err(AgentError::Cancelled) => {
                        // Only this run was cancelled; the worker stays up for
                        // the next one.
                        debug!(agent = %id, kind, run = run.id, "Handler cancelled");
                    }
                    Err(AgentError::DuplicateTerminal(detail)) => {
                        error!(agent = %id, kind, run = run.id, "Duplicate terminal message: {detail}");
                        let mut slot = fatal.lock().expect("fatal slot lock poisoned");
                        if slot.is_none() {
                            *slot = Some(RunError::DuplicateTerminal(detail));
                        }
                        drop(slot);
                        run.cancellation.cancel();
                    }
                    Err(AgentError::Failed(reason)) => {
                        // Bus-level policy: log and drop, no redelivery.
                        error!(agent = %id, kind, run = run.id, "Handler failed, dropping message: {reason}");
                    }
                }

                tracker.completed();
            }
        }
    }
    debug!(agent = %id, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Agent, MessageContext};
    use async_trait::async_trait;
    use codeloop_domain::{
        Candidate, CodingRequest, FinalOutcome, PipelineMessage, Task, Topic,
    };
    use std::sync::Mutex as StdMutex;

    /// Emits one candidate per coding request, tagging it with a serial.
    struct FanOut {
        copies: usize,
    }

    #[async_trait]
    impl Agent for FanOut {
        fn name(&self) -> &str {
            "fan_out"
        }

        async fn on_message(
            &mut self,
            message: PipelineMessage,
            _ctx: &MessageContext,
        ) -> Result<Vec<Publish>, AgentError> {
            match message {
                PipelineMessage::Coding(request) => Ok((0..self.copies)
                    .map(|serial| {
                        Publish::pipeline(PipelineMessage::Candidate(Candidate {
                            task: request.task.clone(),
                            feedback: request.feedback.clone(),
                            response_text: serial.to_string(),
                        }))
                    })
                    .collect()),
                _ => Ok(vec![]),
            }
        }
    }

    /// Records candidate payloads and terminates after the expected count.
    struct Recorder {
        seen: Arc<StdMutex<Vec<String>>>,
        expect: usize,
    }

    #[async_trait]
    impl Agent for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn on_message(
            &mut self,
            message: PipelineMessage,
            _ctx: &MessageContext,
        ) -> Result<Vec<Publish>, AgentError> {
            match message {
                PipelineMessage::Candidate(candidate) => {
                    let mut seen = self.seen.lock().unwrap();
                    seen.push(candidate.response_text);
                    if seen.len() == self.expect {
                        Ok(vec![Publish::pipeline(PipelineMessage::Final(
                            FinalOutcome::Approved {
                                output: seen.join(","),
                            },
                        ))])
                    } else {
                        Ok(vec![])
                    }
                }
                _ => Ok(vec![]),
            }
        }
    }

    /// Consumes everything, produces nothing.
    struct Silent;

    #[async_trait]
    impl Agent for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn on_message(
            &mut self,
            _message: PipelineMessage,
            _ctx: &MessageContext,
        ) -> Result<Vec<Publish>, AgentError> {
            Ok(vec![])
        }
    }

    /// Publishes two terminal messages for one request.
    struct DoubleFinal;

    #[async_trait]
    impl Agent for DoubleFinal {
        fn name(&self) -> &str {
            "double_final"
        }

        async fn on_message(
            &mut self,
            message: PipelineMessage,
            _ctx: &MessageContext,
        ) -> Result<Vec<Publish>, AgentError> {
            match message {
                PipelineMessage::Coding(_) => Ok(vec![
                    Publish::pipeline(PipelineMessage::Final(FinalOutcome::Approved {
                        output: "first".to_string(),
                    })),
                    Publish::pipeline(PipelineMessage::Final(FinalOutcome::Approved {
                        output: "second".to_string(),
                    })),
                ]),
                _ => Ok(vec![]),
            }
        }
    }

    fn initial_coding(description: &str) -> Publish {
        Publish::pipeline(PipelineMessage::Coding(CodingRequest::initial(Task::new(
            description,
        ))))
    }

    fn pipeline_subscriptions(ids: &[&str]) -> Vec<(String, Topic)> {
        ids.iter()
            .map(|id| (id.to_string(), Topic::pipeline()))
            .collect()
    }

    #[tokio::test]
    async fn test_fifo_delivery_within_one_publisher() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let mut registry = AgentRegistry::new();
        registry.register("fan_out", || Box::new(FanOut { copies: 5 }));
        {
            let seen = Arc::clone(&seen);
            registry.register("recorder", move || {
                Box::new(Recorder {
                    seen: Arc::clone(&seen),
                    expect: 5,
                })
            });
        }
        {
            let slot = Arc::new(ResultSlot::new());
            let sink_slot = Arc::clone(&slot);
            registry.register("output_result", move || {
                Box::new(crate::agents::ResultSink::new(Arc::clone(&sink_slot)))
            });

            let runtime = PipelineRuntime::start(
                &registry,
                &pipeline_subscriptions(&["fan_out", "recorder", "output_result"]),
                slot,
                CancellationToken::new(),
            )
            .unwrap();

            let outcome = runtime
                .run(initial_coding("order"), Duration::from_secs(5))
                .await
                .unwrap();

            // Messages published within a single handler invocation arrive in
            // publication order.
            assert_eq!(outcome.value(), "0,1,2,3,4");
            assert_eq!(*seen.lock().unwrap(), vec!["0", "1", "2", "3", "4"]);
            runtime.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_quiescence_without_terminal_is_no_terminal_result() {
        let mut registry = AgentRegistry::new();
        registry.register("silent", || Box::new(Silent));

        let slot = Arc::new(ResultSlot::new());
        let runtime = PipelineRuntime::start(
            &registry,
            &pipeline_subscriptions(&["silent"]),
            slot,
            CancellationToken::new(),
        )
        .unwrap();

        let result = runtime
            .run(initial_coding("dropped"), Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(RunError::NoTerminalResult)));
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_terminal_aborts_the_run() {
        let mut registry = AgentRegistry::new();
        registry.register("double_final", || Box::new(DoubleFinal));
        let slot = Arc::new(ResultSlot::new());
        {
            let sink_slot = Arc::clone(&slot);
            registry.register("output_result", move || {
                Box::new(crate::agents::ResultSink::new(Arc::clone(&sink_slot)))
            });
        }

        let runtime = PipelineRuntime::start(
            &registry,
            &pipeline_subscriptions(&["double_final", "output_result"]),
            slot,
            CancellationToken::new(),
        )
        .unwrap();

        let result = runtime
            .run(initial_coding("twice"), Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(RunError::DuplicateTerminal(_))));
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_subscription_fails_at_start() {
        let registry = AgentRegistry::new();
        let slot = Arc::new(ResultSlot::new());
        let result = PipelineRuntime::start(
            &registry,
            &pipeline_subscriptions(&["ghost"]),
            slot,
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(RunError::UnknownAgent(_))));
    }

    #[tokio::test]
    async fn test_run_timeout_is_distinct() {
        // A handler that never finishes: the driver must give up on its own.
        struct Stuck;

        #[async_trait]
        impl Agent for Stuck {
            fn name(&self) -> &str {
                "stuck"
            }

            async fn on_message(
                &mut self,
                _message: PipelineMessage,
                _ctx: &MessageContext,
            ) -> Result<Vec<Publish>, AgentError> {
                futures::future::pending::<()>().await;
                unreachable!()
            }
        }

        let mut registry = AgentRegistry::new();
        registry.register("stuck", || Box::new(Stuck));

        let slot = Arc::new(ResultSlot::new());
        let runtime = PipelineRuntime::start(
            &registry,
            &pipeline_subscriptions(&["stuck"]),
            slot,
            CancellationToken::new(),
        )
        .unwrap();

        let result = runtime
            .run(initial_coding("hang"), Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(RunError::Timeout(_))));
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_timed_out_run_does_not_poison_the_next() {
        // Finishes well after the first run's deadline; its late terminal
        // must be discarded instead of landing in the second run's slot.
        struct SlowFinal;

        #[async_trait]
        impl Agent for SlowFinal {
            fn name(&self) -> &str {
                "slow_final"
            }

            async fn on_message(
                &mut self,
                message: PipelineMessage,
                _ctx: &MessageContext,
            ) -> Result<Vec<Publish>, AgentError> {
                match message {
                    PipelineMessage::Coding(_) => {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(vec![Publish::pipeline(PipelineMessage::Final(
                            FinalOutcome::Approved {
                                output: "slow".to_string(),
                            },
                        ))])
                    }
                    _ => Ok(vec![]),
                }
            }
        }

        let mut registry = AgentRegistry::new();
        registry.register("slow_final", || Box::new(SlowFinal));
        let slot = Arc::new(ResultSlot::new());
        {
            let sink_slot = Arc::clone(&slot);
            registry.register("output_result", move || {
                Box::new(crate::agents::ResultSink::new(Arc::clone(&sink_slot)))
            });
        }

        let runtime = PipelineRuntime::start(
            &registry,
            &pipeline_subscriptions(&["slow_final", "output_result"]),
            slot,
            CancellationToken::new(),
        )
        .unwrap();

        let first = runtime
            .run(initial_coding("too slow"), Duration::from_millis(50))
            .await;
        assert!(matches!(first, Err(RunError::Timeout(_))));

        // The same runtime must still complete a fresh run, with the late
        // terminal from the abandoned one dropped rather than fatal.
        let second = runtime
            .run(initial_coding("second attempt"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(second.value(), "slow");
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_terminal_does_not_stop_the_workers() {
        // Emits two terminals on its first request, then behaves.
        struct FlakyFinal {
            misbehaved: bool,
        }

        #[async_trait]
        impl Agent for FlakyFinal {
            fn name(&self) -> &str {
                "flaky_final"
            }

            async fn on_message(
                &mut self,
                message: PipelineMessage,
                _ctx: &MessageContext,
            ) -> Result<Vec<Publish>, AgentError> {
                match message {
                    PipelineMessage::Coding(_) if !self.misbehaved => {
                        self.misbehaved = true;
                        Ok(vec![
                            Publish::pipeline(PipelineMessage::Final(FinalOutcome::Approved {
                                output: "first".to_string(),
                            })),
                            Publish::pipeline(PipelineMessage::Final(FinalOutcome::Approved {
                                output: "second".to_string(),
                            })),
                        ])
                    }
                    PipelineMessage::Coding(_) => Ok(vec![Publish::pipeline(
                        PipelineMessage::Final(FinalOutcome::Approved {
                            output: "recovered".to_string(),
                        }),
                    )]),
                    _ => Ok(vec![]),
                }
            }
        }

        let mut registry = AgentRegistry::new();
        registry.register("flaky_final", || Box::new(FlakyFinal { misbehaved: false }));
        let slot = Arc::new(ResultSlot::new());
        {
            let sink_slot = Arc::clone(&slot);
            registry.register("output_result", move || {
                Box::new(crate::agents::ResultSink::new(Arc::clone(&sink_slot)))
            });
        }

        let runtime = PipelineRuntime::start(
            &registry,
            &pipeline_subscriptions(&["flaky_final", "output_result"]),
            slot,
            CancellationToken::new(),
        )
        .unwrap();

        let first = runtime
            .run(initial_coding("twice"), Duration::from_secs(5))
            .await;
        assert!(matches!(first, Err(RunError::DuplicateTerminal(_))));

        // Aborting the offending run leaves the runtime usable.
        let second = runtime
            .run(initial_coding("once"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(second.value(), "recovered");
        runtime.shutdown().await;
    }
}
