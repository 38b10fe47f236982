// Agent Desktop
// Main entry point for the agent-desktop binary

use agent_desktop::cli::{Cli, Command};
use agent_desktop::config::Config;
use agent_desktop::handlers::{
    handle_chat, handle_check, handle_doctor, handle_run, handle_tools, OutputFormat,
};
use agent_desktop::telemetry::init_telemetry_with_level;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that need no configuration
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    match &cli.command {
        Command::Tools => return handle_tools(format),
        Command::Check { command } => return handle_check(command, format),
        _ => {}
    }

    // Load configuration (or use custom path if provided)
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let config = if cli.config.is_some() {
        Config::load_from_path(&config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config; RUST_LOG wins over both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");
    tracing::debug!("Agent Desktop v{} ({} - {})", version, commit, timestamp);

    match cli.command {
        Command::Run {
            task,
            context,
            max_steps,
        } => {
            tracing::info!("Executing task: {}", task);
            handle_run(task, context, max_steps, &config, format).await
        }

        Command::Chat => handle_chat(&config, format).await,

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, &config_path, format).await
        }

        Command::Tools | Command::Check { .. } => Ok(()),
    }
}
