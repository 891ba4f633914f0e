//! Messages exchanged between pipeline roles.
//!
//! Every hop in the generate→execute→review loop is one of the
//! [`PipelineMessage`] variants. The enum is closed: handlers match
//! exhaustively, so adding a message type is a compile-time event for every
//! role. The [`Task`] travels unchanged inside each message and serves as the
//! correlation key for a run.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// A unit of work, created once per user request (Value Object)
///
/// Carried unchanged through every message in a run; equality on the
/// description is what lets roles detect that a new run has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    /// Construct a task, rejecting blank descriptions.
    pub fn try_new(description: &str) -> Result<Self, DomainError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(DomainError::EmptyTask);
        }
        Ok(Self::new(description))
    }
}

/// Request for the Proposer to draft (or redraft) a script
///
/// `feedback` is empty on the first attempt and holds the Reviewer's
/// critique on retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodingRequest {
    pub task: Task,
    pub feedback: String,
}

impl CodingRequest {
    /// First attempt: no feedback yet.
    pub fn initial(task: Task) -> Self {
        Self {
            task,
            feedback: String::new(),
        }
    }

    /// Retry attempt carrying the Reviewer's critique.
    pub fn retry(task: Task, feedback: impl Into<String>) -> Self {
        Self {
            task,
            feedback: feedback.into(),
        }
    }

    pub fn is_retry(&self) -> bool {
        !self.feedback.is_empty()
    }
}

/// The Proposer's draft, addressed to the Executor
///
/// `response_text` is the *full* raw model response, not just the extracted
/// code, so the Executor can locate every fenced block itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub task: Task,
    pub feedback: String,
    pub response_text: String,
}

/// The Executor's report, addressed to the Reviewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub task: Task,
    /// The candidate text the executed blocks were extracted from.
    pub response_text: String,
    /// Combined stdout/stderr of all executed blocks.
    pub output: String,
    /// Whether every block ran to completion without a sandbox-reported error.
    pub succeeded: bool,
}

/// The Reviewer's decision for one execution report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewVerdict {
    /// The output satisfies the task.
    Approved { output: String },
    /// Not yet: loop back to the Proposer with this critique.
    Retry { feedback: String },
    /// Retry budget exhausted.
    GaveUp { last_output: String },
}

/// Terminal value of a run, delivered to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalOutcome {
    Approved {
        output: String,
    },
    GaveUp {
        message: String,
        last_output: String,
    },
}

impl FinalOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, FinalOutcome::Approved { .. })
    }

    /// The user-facing value: the approved output, or the give-up message.
    pub fn value(&self) -> &str {
        match self {
            FinalOutcome::Approved { output } => output,
            FinalOutcome::GaveUp { message, .. } => message,
        }
    }
}

/// Closed sum of all messages that cross the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineMessage {
    /// Task or retry, consumed by the Proposer.
    Coding(CodingRequest),
    /// Draft script, consumed by the Executor.
    Candidate(Candidate),
    /// Execution result, consumed by the Reviewer.
    Report(ExecutionReport),
    /// Terminal message, consumed by the result sink.
    Final(FinalOutcome),
}

impl PipelineMessage {
    /// Short variant name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineMessage::Coding(_) => "coding",
            PipelineMessage::Candidate(_) => "candidate",
            PipelineMessage::Report(_) => "report",
            PipelineMessage::Final(_) => "final",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineMessage::Final(_))
    }
}
