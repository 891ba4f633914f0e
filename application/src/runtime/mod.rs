//! Actor runtime
//!
//! One worker task per registered agent, message passing over bounded
//! channels, and quiescence detection by counting queued plus executing
//! deliveries. At most one handler runs per agent at a time, so agent state
//! (conversation history, attempt counter) needs no locks.

pub mod bus;
pub mod driver;
pub mod registry;
pub mod result_slot;

pub use bus::{InFlightTracker, MessageBus, Publish};
pub use driver::{PipelineRuntime, RunError};
pub use registry::AgentRegistry;
pub use result_slot::{ResultSlot, SlotError};
