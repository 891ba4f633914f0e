//! Prompt templates for the propose→execute→review loop

use crate::pipeline::ExecutionReport;

/// Templates for generating prompts at each stage
pub struct PipelinePrompts;

impl PipelinePrompts {
    /// System prompt seeding the Proposer's conversation
    pub fn proposer_system() -> &'static str {
        r#"Write a Python or Bash script in a markdown code block based on the user's task and feedback, and it will be executed.
Always save figures to file in the current directory.
All code required to complete this task must be contained within a single response.
Do not include any additional text outside of the code block."#
    }

    /// User turn for a coding request (initial or retry)
    pub fn coding_turn(task_description: &str, feedback: &str) -> String {
        format!(
            "The user's task: {}\nThe feedback: {}",
            task_description, feedback
        )
    }

    /// System prompt seeding the Reviewer's conversation
    pub fn reviewer_system() -> &'static str {
        r#"You are a code execution result reviewer.
Consider the user's task and the code execution result. Respond with 'APPROVE' when the code execution result is correct and meets the user's task. Otherwise, provide constructive feedback that can fix the code to meet the user's task."#
    }

    /// User turn presenting one execution report for review
    pub fn review_turn(report: &ExecutionReport) -> String {
        format!(
            "The user's task: {}\nThe code:\n{}\nThe code execution result:\n{}",
            report.task.description, report.response_text, report.output
        )
    }
}
