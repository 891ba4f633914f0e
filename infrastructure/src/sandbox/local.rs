//! Local subprocess sandbox.
//!
//! Writes each code block to a script file inside a scoped working
//! directory and runs it with the matching interpreter. The directory
//! persists across calls on the same instance, so later attempts of a
//! pipeline see files written by earlier ones. When no directory is
//! configured a temporary one is created and removed on drop.

use async_trait::async_trait;
use codeloop_application::ports::sandbox::{CodeSandbox, ExecutionResult, SandboxError};
use codeloop_domain::CodeBlock;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-block output cap. Runaway print loops get truncated, not buffered.
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

const TRUNCATION_MARKER: &str = "\n... (output truncated)";

/// Runs code blocks as local subprocesses in a scoped working directory
pub struct LocalSandbox {
    workdir: PathBuf,
    exec_timeout: Duration,
    // Held so the directory outlives the sandbox when auto-created.
    _tempdir: Option<tempfile::TempDir>,
}

impl LocalSandbox {
    /// Create a sandbox rooted at `workdir`, or at a fresh temporary
    /// directory when none is given.
    pub fn new(workdir: Option<PathBuf>, exec_timeout: Duration) -> Result<Self, SandboxError> {
        match workdir {
            Some(path) => {
                std::fs::create_dir_all(&path)?;
                Ok(Self {
                    workdir: path,
                    exec_timeout,
                    _tempdir: None,
                })
            }
            None => {
                let tempdir = tempfile::Builder::new().prefix("codeloop-").tempdir()?;
                Ok(Self {
                    workdir: tempdir.path().to_path_buf(),
                    exec_timeout,
                    _tempdir: Some(tempdir),
                })
            }
        }
    }

    pub fn workdir(&self) -> &std::path::Path {
        &self.workdir
    }

    async fn run_block(
        &self,
        index: usize,
        block: &CodeBlock,
        cancellation: &CancellationToken,
    ) -> Result<BlockOutcome, SandboxError> {
        let Some((interpreter, extension)) = interpreter_for(&block.language) else {
            return Ok(BlockOutcome {
                output: format!("unsupported language: {}\n", block.language),
                exit_ok: false,
            });
        };

        let script_path = self.workdir.join(format!("block_{index}.{extension}"));
        tokio::fs::write(&script_path, &block.source).await?;

        let child = Command::new(interpreter)
            .arg(&script_path)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| SandboxError::Spawn(format!("{interpreter}: {err}")))?;

        debug!(index, interpreter, "Executing code block");

        let output = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(SandboxError::Cancelled),
            waited = tokio::time::timeout(self.exec_timeout, child.wait_with_output()) => {
                match waited {
                    Ok(result) => result?,
                    Err(_) => return Err(SandboxError::Timeout(self.exec_timeout.as_secs())),
                }
            }
        };

        let mut combined = truncate_output(String::from_utf8_lossy(&output.stdout).into_owned());
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            combined.push_str("\n--- stderr ---\n");
            combined.push_str(&truncate_output(stderr.into_owned()));
        }

        let exit_ok = output.status.success();
        if !exit_ok {
            let code = output
                .status
                .code()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string());
            combined.push_str(&format!("\nCommand exited with code {code}"));
        }

        Ok(BlockOutcome {
            output: combined,
            exit_ok,
        })
    }
}

struct BlockOutcome {
    output: String,
    exit_ok: bool,
}

/// Map a fence tag to (interpreter, script extension). Untagged fences
/// default to the shell.
fn interpreter_for(language: &str) -> Option<(&'static str, &'static str)> {
    match language.to_ascii_lowercase().as_str() {
        "python" | "py" => Some(("python3", "py")),
        "bash" | "sh" | "shell" | "" => Some(("sh", "sh")),
        _ => None,
    }
}

fn truncate_output(mut text: String) -> String {
    if text.len() > MAX_OUTPUT_BYTES {
        let mut cut = MAX_OUTPUT_BYTES;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

#[async_trait]
impl CodeSandbox for LocalSandbox {
    async fn execute(
        &self,
        blocks: &[CodeBlock],
        cancellation: &CancellationToken,
    ) -> Result<ExecutionResult, SandboxError> {
        let mut combined_output = String::new();
        let mut exit_ok = true;

        for (index, block) in blocks.iter().enumerate() {
            let outcome = self.run_block(index, block, cancellation).await?;
            if !combined_output.is_empty() && !outcome.output.is_empty() {
                combined_output.push('\n');
            }
            combined_output.push_str(&outcome.output);

            // A failed block invalidates whatever would follow it.
            if !outcome.exit_ok {
                exit_ok = false;
                break;
            }
        }

        Ok(ExecutionResult {
            combined_output,
            exit_ok,
        })
    }
}
