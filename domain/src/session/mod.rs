//! Conversation history held by each agent instance

pub mod history;

pub use history::{ConversationHistory, Message, Role};
