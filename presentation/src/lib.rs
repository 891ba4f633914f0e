//! Presentation layer for codeloop
//!
//! This crate contains the CLI definition, output formatters, and the
//! interactive task REPL.

pub mod chat;
pub mod cli;
pub mod output;

// Re-export commonly used types
pub use chat::TaskRepl;
pub use cli::commands::Cli;
pub use output::console::ConsoleFormatter;
