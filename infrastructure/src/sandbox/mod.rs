//! Code execution adapters

pub mod local;

pub use local::LocalSandbox;
