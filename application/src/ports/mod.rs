//! Port definitions
//!
//! Interfaces the pipeline calls but does not implement. Adapters live in
//! the infrastructure layer.

pub mod completion;
pub mod sandbox;
