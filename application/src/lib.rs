//! Application layer for codeloop
//!
//! This crate contains the port definitions, the actor runtime (message bus,
//! agent registry, result sink, driver), the three pipeline roles, and the
//! run-task use case. It depends only on the domain layer.

pub mod agents;
pub mod ports;
pub mod runtime;
pub mod use_cases;

// Re-export commonly used types
pub use agents::{Agent, AgentError, Executor, MessageContext, Proposer, ResultSink, Reviewer};
pub use ports::{
    completion::{CompletionGateway, GatewayError},
    sandbox::{CodeSandbox, ExecutionResult, SandboxError},
};
pub use runtime::{
    bus::{InFlightTracker, MessageBus, Publish},
    driver::{PipelineRuntime, RunError},
    registry::AgentRegistry,
    result_slot::{ResultSlot, SlotError},
};
pub use use_cases::run_task::{PipelineSettings, RunTaskError, RunTaskOutput, RunTaskUseCase};
