//! One-shot terminal result handoff.
//!
//! One run produces exactly one terminal message. The slot makes that
//! invariant mechanical: `arm` installs a fresh sender keyed by the run's id,
//! a second `complete` for the same run fails loudly, and a `complete` from a
//! superseded run is rejected as stale instead of landing in the next run's
//! channel.

use codeloop_domain::FinalOutcome;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SlotError {
    #[error("Result slot is not armed — no run in progress")]
    NotArmed,

    #[error("Terminal result already delivered for this run")]
    AlreadyCompleted,

    #[error("Terminal result belongs to a superseded run")]
    StaleRun,
}

#[derive(Default)]
enum SlotState {
    #[default]
    Idle,
    Armed {
        run_id: u64,
        sender: oneshot::Sender<FinalOutcome>,
    },
    Drained {
        run_id: u64,
    },
}

/// Single-slot asynchronous handoff between the result sink and the driver
#[derive(Default)]
pub struct ResultSlot {
    state: Mutex<SlotState>,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh sender for the given run and hand the receiver to the
    /// driver. Any previous state is discarded.
    pub fn arm(&self, run_id: u64) -> oneshot::Receiver<FinalOutcome> {
        let (sender, receiver) = oneshot::channel();
        *self.state.lock().expect("slot lock poisoned") = SlotState::Armed { run_id, sender };
        receiver
    }

    /// Deliver a run's terminal outcome. Exactly one delivery per arm, and
    /// only for the run the slot is currently armed for.
    pub fn complete(&self, run_id: u64, outcome: FinalOutcome) -> Result<(), SlotError> {
        let mut state = self.state.lock().expect("slot lock poisoned");
        match std::mem::take(&mut *state) {
            SlotState::Armed { run_id: armed, sender } if armed == run_id => {
                *state = SlotState::Drained { run_id: armed };
                if sender.send(outcome).is_err() {
                    // Driver gave up on this run (timeout/cancel); nothing to do.
                    debug!("Terminal result delivered after the driver stopped waiting");
                }
                Ok(())
            }
            armed @ SlotState::Armed { .. } => {
                *state = armed;
                Err(SlotError::StaleRun)
            }
            SlotState::Drained { run_id: drained } if drained == run_id => {
                *state = SlotState::Drained { run_id: drained };
                Err(SlotError::AlreadyCompleted)
            }
            drained @ SlotState::Drained { .. } => {
                *state = drained;
                Err(SlotError::StaleRun)
            }
            SlotState::Idle => Err(SlotError::NotArmed),
        }
    }
}
