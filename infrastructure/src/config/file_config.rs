//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into domain policies by the
//! `parse_*` helpers, which fall back to defaults on invalid values rather
//! than aborting startup.

use codeloop_domain::{ApprovalPolicy, MatchStrictness, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Top-level configuration as read from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub pipeline: FilePipelineConfig,
    pub sandbox: FileSandboxConfig,
    pub llm: FileLlmConfig,
}

/// Raw pipeline configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePipelineConfig {
    /// Retries after the first rejected attempt.
    pub max_attempts: u32,
    /// Token the reviewer must produce to approve.
    pub approval_token: String,
    /// "exact" or "contains".
    pub match_strictness: String,
    /// Wall-clock cap for one whole run.
    pub run_timeout_secs: u64,
}

impl Default for FilePipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            approval_token: "APPROVE".to_string(),
            match_strictness: "exact".to_string(),
            run_timeout_secs: 600,
        }
    }
}

impl FilePipelineConfig {
    pub fn parse_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
    }

    /// Parse the approval settings, warning and defaulting on bad values.
    pub fn parse_approval_policy(&self) -> ApprovalPolicy {
        let strictness = match self.match_strictness.parse::<MatchStrictness>() {
            Ok(strictness) => strictness,
            Err(err) => {
                warn!("Invalid match_strictness in config ({err}), using 'exact'");
                MatchStrictness::Exact
            }
        };
        let token = if self.approval_token.trim().is_empty() {
            warn!("Empty approval_token in config, using 'APPROVE'");
            "APPROVE".to_string()
        } else {
            self.approval_token.clone()
        };
        ApprovalPolicy::new(token, strictness)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

/// Raw sandbox configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSandboxConfig {
    /// Working directory for executed code. Temporary when unset.
    pub workdir: Option<PathBuf>,
    /// Per-block execution timeout.
    pub exec_timeout_secs: u64,
}

impl Default for FileSandboxConfig {
    fn default() -> Self {
        Self {
            workdir: None,
            exec_timeout_secs: 60,
        }
    }
}

impl FileSandboxConfig {
    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }
}

/// Raw LLM endpoint configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLlmConfig {
    /// Chat-completions base URL.
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key. The key itself never
    /// appears in config files.
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

impl Default for FileLlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl FileLlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
