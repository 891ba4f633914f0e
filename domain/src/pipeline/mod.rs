//! Pipeline wire messages and routing keys

pub mod messages;
pub mod topic;

pub use messages::{
    Candidate, CodingRequest, ExecutionReport, FinalOutcome, PipelineMessage, ReviewVerdict, Task,
};
pub use topic::Topic;
