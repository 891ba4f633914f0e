//! Infrastructure layer for codeloop
//!
//! Adapters for the application-layer ports: an OpenAI-compatible completion
//! gateway, a local shell sandbox, and the TOML configuration loader.

pub mod config;
pub mod providers;
pub mod sandbox;

// Re-export commonly used types
pub use config::{ConfigLoader, FileConfig};
pub use providers::openai::{OpenAiGateway, OpenAiSettings};
pub use sandbox::local::LocalSandbox;
