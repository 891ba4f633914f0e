//! Prompt templates for the pipeline roles

pub mod templates;

pub use templates::PipelinePrompts;
