//! REPL (Read-Eval-Print Loop) for interactive task sessions

use crate::ConsoleFormatter;
use codeloop_application::RunTaskUseCase;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};

/// What a line of input asks the REPL to do
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Exit,
    Reset,
    Help,
    Task(&'a str),
    Empty,
}

fn parse_line(line: &str) -> ReplCommand<'_> {
    let trimmed = line.trim();
    match trimmed.to_lowercase().as_str() {
        "" => ReplCommand::Empty,
        "exit" | "quit" => ReplCommand::Exit,
        "reset" => ReplCommand::Reset,
        "help" | "?" => ReplCommand::Help,
        _ => ReplCommand::Task(trimmed),
    }
}

/// Interactive task REPL
///
/// Agent conversation histories persist across tasks in a session, so a
/// follow-up task can refer to earlier ones. `reset` clears them.
pub struct TaskRepl {
    use_case: RunTaskUseCase,
    quiet: bool,
}

impl TaskRepl {
    pub fn new(use_case: RunTaskUseCase) -> Self {
        Self {
            use_case,
            quiet: false,
        }
    }

    /// Only print terminal values, no run summaries.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Run the interactive REPL until `exit` or EOF.
    pub async fn run(self) -> RlResult<()> {
        let mut rl = DefaultEditor::new()?;

        let history_path = dirs::data_dir().map(|p| p.join("codeloop").join("history.txt"));
        if let Some(ref path) = history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(path);
        }

        Self::print_welcome();

        loop {
            match rl.readline(">>> ") {
                Ok(line) => match parse_line(&line) {
                    ReplCommand::Empty => continue,
                    ReplCommand::Exit => {
                        println!("Bye!");
                        break;
                    }
                    ReplCommand::Reset => {
                        self.use_case.reset().await;
                        println!("Session reset.");
                    }
                    ReplCommand::Help => Self::print_help(),
                    ReplCommand::Task(task) => {
                        let _ = rl.add_history_entry(task);
                        self.process_task(task).await;
                    }
                },
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(ref path) = history_path {
            let _ = rl.save_history(path);
        }

        self.use_case.shutdown().await;
        Ok(())
    }

    fn print_welcome() {
        println!();
        println!("codeloop - interactive mode");
        println!("Type a task to run it, or 'help' for commands.");
        println!();
    }

    fn print_help() {
        println!();
        println!("Commands:");
        println!("  help, ?     - Show this help");
        println!("  reset       - Clear agent conversation histories");
        println!("  exit, quit  - Leave the session");
        println!();
        println!("Anything else is run as a task.");
        println!();
    }

    async fn process_task(&self, task: &str) {
        println!();
        match self.use_case.execute(task).await {
            Ok(result) => {
                let output = if self.quiet {
                    ConsoleFormatter::format_value_only(&result)
                } else {
                    ConsoleFormatter::format(&result)
                };
                println!("{}", output);
            }
            Err(err) => {
                eprintln!("Error: {}", err);
            }
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exit_commands() {
        assert_eq!(parse_line("exit"), ReplCommand::Exit);
        assert_eq!(parse_line("  QUIT  "), ReplCommand::Exit);
    }

    #[test]
    fn test_parse_reset_and_help() {
        assert_eq!(parse_line("reset"), ReplCommand::Reset);
        assert_eq!(parse_line("help"), ReplCommand::Help);
        assert_eq!(parse_line("?"), ReplCommand::Help);
    }

    #[test]
    fn test_parse_task_keeps_original_casing() {
        assert_eq!(
            parse_line("  Print Hello World  "),
            ReplCommand::Task("Print Hello World")
        );
    }

    #[test]
    fn test_parse_blank_line() {
        assert_eq!(parse_line("   "), ReplCommand::Empty);
    }
}
