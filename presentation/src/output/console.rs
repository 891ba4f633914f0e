//! Console output formatter for task run results

use codeloop_application::use_cases::run_task::RunTaskOutput;
use codeloop_domain::FinalOutcome;
use colored::Colorize;

/// Formats run outcomes for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete run result
    pub fn format(result: &RunTaskOutput) -> String {
        let mut output = String::new();

        match &result.outcome {
            FinalOutcome::Approved { output: value } => {
                output.push_str(&format!("{}\n\n", "=== Approved ===".green().bold()));
                output.push_str(value);
                if !value.ends_with('\n') {
                    output.push('\n');
                }
            }
            FinalOutcome::GaveUp {
                message,
                last_output,
            } => {
                output.push_str(&format!("{}\n\n", "=== Gave up ===".red().bold()));
                output.push_str(&format!("{message}\n"));
                if !last_output.trim().is_empty() {
                    output.push_str(&format!(
                        "\n{}\n{last_output}\n",
                        "Last output:".yellow().bold()
                    ));
                }
            }
        }

        output.push_str(&format!(
            "\n{} {:.1}s\n",
            "Elapsed:".cyan().bold(),
            result.elapsed.as_secs_f64()
        ));

        output
    }

    /// Format only the terminal value (for --quiet)
    pub fn format_value_only(result: &RunTaskOutput) -> String {
        result.outcome.value().to_string()
    }
}
