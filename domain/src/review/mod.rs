//! Review and retry policies

pub mod policy;

pub use policy::{ApprovalPolicy, MatchStrictness, RetryPolicy};
