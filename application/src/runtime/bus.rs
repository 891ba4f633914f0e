//! Topic-keyed publish/subscribe message bus.
//!
//! `publish` enqueues one envelope per current subscriber of the topic and
//! returns once queued, not once handled. Each subscriber has its own
//! bounded channel, so delivery is FIFO per subscriber relative to one
//! publisher; there is no global total order across publishers.

use codeloop_domain::{PipelineMessage, Topic};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A message addressed to one topic
#[derive(Debug, Clone)]
pub struct Publish {
    pub topic: Topic,
    pub message: PipelineMessage,
}

impl Publish {
    pub fn new(topic: Topic, message: PipelineMessage) -> Self {
        Self { topic, message }
    }

    /// Publish on the default pipeline topic.
    pub fn pipeline(message: PipelineMessage) -> Self {
        Self::new(Topic::pipeline(), message)
    }
}

/// Identity of one run: a monotonically increasing id plus the run-scoped
/// cancellation token.
///
/// Every envelope carries the handle of the run it belongs to, and handlers
/// publish their follow-ups under the same handle. Abandoning a run (timeout,
/// duplicate terminal) cancels only this token, so stale work stops without
/// tearing down the workers, and its late messages stay distinguishable from
/// the next run's.
#[derive(Debug, Clone)]
pub(crate) struct RunHandle {
    pub(crate) id: u64,
    pub(crate) cancellation: CancellationToken,
}

/// Envelope delivered to an agent worker
#[derive(Debug)]
pub(crate) enum Envelope {
    Deliver {
        topic: Topic,
        message: PipelineMessage,
        run: RunHandle,
    },
    /// Control: clear the agent's conversation state.
    Reset,
}

/// Counts deliveries that are queued or currently being handled.
///
/// The bus increments before enqueueing; the worker decrements after the
/// handler returns and its follow-up publishes are queued. The count can
/// therefore only reach zero at true quiescence: empty queues and no
/// handler executing.
#[derive(Debug, Default)]
pub struct InFlightTracker {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueued(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn completed(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    pub fn in_flight(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Resolve once no deliveries are queued or executing. Event-driven, no
    /// busy polling.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// In-process publish/subscribe mechanism keyed by topic
pub struct MessageBus {
    /// topic → subscriber ids, in subscription order
    subscriptions: HashMap<Topic, Vec<String>>,
    /// subscriber id → its worker's inbox
    senders: HashMap<String, mpsc::Sender<Envelope>>,
    tracker: Arc<InFlightTracker>,
}

impl MessageBus {
    pub(crate) fn new(tracker: Arc<InFlightTracker>) -> Self {
        Self {
            subscriptions: HashMap::new(),
            senders: HashMap::new(),
            tracker,
        }
    }

    /// Register interest. Subscriptions are established before the runtime
    /// starts and are static for its duration.
    pub(crate) fn subscribe(&mut self, agent_id: &str, topic: Topic) {
        let subscribers = self.subscriptions.entry(topic).or_default();
        if !subscribers.iter().any(|id| id == agent_id) {
            subscribers.push(agent_id.to_string());
        }
    }

    pub(crate) fn attach(&mut self, agent_id: &str, sender: mpsc::Sender<Envelope>) {
        self.senders.insert(agent_id.to_string(), sender);
    }

    /// Deliver `message` to every subscriber of `topic`, in subscription
    /// order, stamped with the run it belongs to. Returns once every copy is
    /// queued.
    pub(crate) async fn publish(&self, topic: &Topic, message: PipelineMessage, run: &RunHandle) {
        let Some(subscribers) = self.subscriptions.get(topic) else {
            debug!(topic = %topic, kind = message.kind(), "No subscribers for topic, dropping");
            return;
        };

        for agent_id in subscribers {
            let Some(sender) = self.senders.get(agent_id) else {
                warn!(agent = %agent_id, "Subscriber has no attached worker");
                continue;
            };

            self.tracker.enqueued();
            let envelope = Envelope::Deliver {
                topic: topic.clone(),
                message: message.clone(),
                run: run.clone(),
            };
            if sender.send(envelope).await.is_err() {
                // Worker already stopped (shutdown or fatal error).
                self.tracker.completed();
                debug!(agent = %agent_id, "Worker inbox closed, dropping delivery");
            }
        }
    }

    /// Deliver a reset control envelope to every attached worker.
    pub(crate) async fn broadcast_reset(&self) {
        for (agent_id, sender) in &self.senders {
            self.tracker.enqueued();
            if sender.send(Envelope::Reset).await.is_err() {
                self.tracker.completed();
                debug!(agent = %agent_id, "Worker inbox closed, skipping reset");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run_handle() -> RunHandle {
        RunHandle {
            id: 1,
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_tracker_idle_when_empty() {
        let tracker = InFlightTracker::new();
        // Resolves immediately at zero.
        tokio::time::timeout(Duration::from_millis(50), tracker.wait_idle())
            .await
            .expect("wait_idle should resolve at zero");
    }

    #[tokio::test]
    async fn test_tracker_waits_for_completion() {
        let tracker = Arc::new(InFlightTracker::new());
        tracker.enqueued();
        tracker.enqueued();
        assert_eq!(tracker.in_flight(), 2);

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.wait_idle().await })
        };

        tracker.completed();
        assert_eq!(tracker.in_flight(), 1);
        assert!(!waiter.is_finished());

        tracker.completed();
        tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .expect("waiter should finish once count reaches zero")
            .unwrap();
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let tracker = Arc::new(InFlightTracker::new());
        let bus = MessageBus::new(Arc::clone(&tracker));

        bus.publish(
            &Topic::pipeline(),
            PipelineMessage::Coding(codeloop_domain::CodingRequest::initial(
                codeloop_domain::Task::new("t"),
            )),
            &run_handle(),
        )
        .await;

        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_publish_enqueues_per_subscriber() {
        let tracker = Arc::new(InFlightTracker::new());
        let mut bus = MessageBus::new(Arc::clone(&tracker));

        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        bus.subscribe("a", Topic::pipeline());
        bus.subscribe("b", Topic::pipeline());
        bus.attach("a", tx_a);
        bus.attach("b", tx_b);

        let message = PipelineMessage::Final(codeloop_domain::FinalOutcome::Approved {
            output: "done".to_string(),
        });
        bus.publish(&Topic::pipeline(), message, &run_handle()).await;

        assert_eq!(tracker.in_flight(), 2);
        assert!(matches!(
            rx_a.recv().await,
            Some(Envelope::Deliver { .. })
        ));
        assert!(matches!(
            rx_b.recv().await,
            Some(Envelope::Deliver { .. })
        ));
    }
}
