//! Completion gateway adapters

pub mod openai;
