//! CLI command definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for codeloop
#[derive(Parser, Debug)]
#[command(name = "codeloop")]
#[command(author, version, about = "Coding agent loop - propose, execute, review, retry")]
#[command(long_about = r#"
Codeloop runs a task through a pipeline of three roles:

1. Proposer: a model drafts a script for your task
2. Executor: fenced code blocks are run in a scoped working directory
3. Reviewer: a model inspects the output and approves or sends feedback back

Rejected attempts loop back to the proposer with the reviewer's feedback,
up to a bounded number of retries.

Configuration files are loaded from (in priority order):
1. --config <path>     Explicit config file
2. ./codeloop.toml     Project-level config
3. ~/.config/codeloop/config.toml   Global config

Example:
  codeloop "write a script that prints the first 10 primes"
  codeloop --max-attempts 5 "sort the lines of input.txt"
  codeloop --chat
"#)]
pub struct Cli {
    /// The task to run (not required in chat mode)
    pub task: Option<String>,

    /// Start interactive chat mode
    #[arg(short, long)]
    pub chat: bool,

    /// Model used for both the proposer and the reviewer
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Retries after the first rejected attempt
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Working directory for executed code (temporary when unset)
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print the final output, no run summary
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_task() {
        let cli = Cli::parse_from(["codeloop", "print hello"]);
        assert_eq!(cli.task.as_deref(), Some("print hello"));
        assert!(!cli.chat);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_chat_mode_without_task() {
        let cli = Cli::parse_from(["codeloop", "--chat", "-vv"]);
        assert!(cli.chat);
        assert!(cli.task.is_none());
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_overrides() {
        let cli = Cli::parse_from([
            "codeloop",
            "--max-attempts",
            "5",
            "--workdir",
            "/tmp/scratch",
            "--model",
            "gpt-4o",
            "task",
        ]);
        assert_eq!(cli.max_attempts, Some(5));
        assert_eq!(cli.workdir.as_deref(), Some(std::path::Path::new("/tmp/scratch")));
        assert_eq!(cli.model.as_deref(), Some("gpt-4o"));
    }
}
