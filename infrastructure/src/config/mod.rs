//! Configuration file loading for codeloop
//!
//! This module handles file I/O and merging of configuration from multiple
//! sources. The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. Project root: `./codeloop.toml` or `./.codeloop.toml`
//! 3. XDG config: `$XDG_CONFIG_HOME/codeloop/config.toml`
//! 4. Fallback: `~/.config/codeloop/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{FileConfig, FileLlmConfig, FilePipelineConfig, FileSandboxConfig};
pub use loader::ConfigLoader;
