//! CLI entrypoint for codeloop
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{bail, Context, Result};
use clap::Parser;
use codeloop_application::{PipelineSettings, RunTaskUseCase};
use codeloop_infrastructure::{
    ConfigLoader, FileConfig, LocalSandbox, OpenAiGateway, OpenAiSettings,
};
use codeloop_presentation::{Cli, ConsoleFormatter, TaskRepl};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting codeloop");

    // Load configuration, then apply CLI overrides on top
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow::anyhow!(e))?
    };

    if let Some(max_attempts) = cli.max_attempts {
        config.pipeline.max_attempts = max_attempts;
    }
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if let Some(workdir) = &cli.workdir {
        config.sandbox.workdir = Some(workdir.clone());
    }

    // === Dependency Injection ===
    let use_case = build_use_case(&config)?;

    // Chat mode (rustyline handles interrupts itself)
    if cli.chat {
        let repl = TaskRepl::new(use_case).with_quiet(cli.quiet);
        repl.run().await?;
        return Ok(());
    }

    // Single task mode - task is required
    let task = match cli.task {
        Some(task) => task,
        None => bail!("Task is required. Use --chat for interactive mode."),
    };

    // Cancel the in-flight run on Ctrl-C so workers stop cleanly.
    spawn_ctrl_c_handler(use_case.cancellation().clone());

    let result = use_case.execute(&task).await;
    let approved = match &result {
        Ok(output) => {
            let text = if cli.quiet {
                ConsoleFormatter::format_value_only(output)
            } else {
                ConsoleFormatter::format(output)
            };
            println!("{}", text);
            output.outcome.is_approved()
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            false
        }
    };

    use_case.shutdown().await;

    if !approved {
        std::process::exit(1);
    }
    Ok(())
}

/// Build the pipeline from adapters described by the config.
fn build_use_case(config: &FileConfig) -> Result<RunTaskUseCase> {
    let api_key = std::env::var(&config.llm.api_key_env).with_context(|| {
        format!(
            "API key environment variable '{}' is not set",
            config.llm.api_key_env
        )
    })?;

    let gateway = OpenAiGateway::new(
        OpenAiSettings::new(api_key, config.llm.model.clone())
            .with_base_url(config.llm.base_url.clone())
            .with_request_timeout(config.llm.request_timeout()),
    )?;

    let sandbox = LocalSandbox::new(config.sandbox.workdir.clone(), config.sandbox.exec_timeout())?;
    info!("Sandbox working directory: {}", sandbox.workdir().display());

    let settings = PipelineSettings {
        retry: config.pipeline.parse_retry_policy(),
        approval: config.pipeline.parse_approval_policy(),
        run_timeout: config.pipeline.run_timeout(),
    };

    Ok(RunTaskUseCase::new(
        Arc::new(gateway),
        Arc::new(sandbox),
        settings,
    )?)
}

fn spawn_ctrl_c_handler(cancellation: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling current run");
            cancellation.cancel();
        }
    });
}
