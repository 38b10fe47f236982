//! Command handlers for CLI operations
//!
//! - run: execute a task and stream its steps
//! - chat: multi-turn conversation over stdin
//! - tools: list the tool schemas
//! - check: classify a command with the safety filter
//! - doctor: validate configuration and test the model connection

use anyhow::{bail, Context, Result};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent::prompts::system_prompt;
use crate::agent::{AgentLoop, AgentOptions, RunController, RunHandle, Step, StepKind};
use crate::command_safety;
use crate::config::Config;
use crate::llm::{self, AzureOpenAIProvider};
use crate::platform;
use crate::tools::{tool_definitions, Session, ToolRegistry};
use sdk::errors::AgentErrorExt;
use sdk::Message;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Wire the configured provider, a fresh session and the tool registry
/// into an agent loop
pub fn build_agent(config: &Config) -> Result<AgentLoop> {
    let provider = AzureOpenAIProvider::from_config(config).map_err(|e| {
        anyhow::anyhow!("{} ({})", e, e.user_hint())
    })?;

    let session = Arc::new(Session::from_env());
    let tools = ToolRegistry::new(session)
        .with_default_timeout(Duration::from_secs(config.execution.timeout_secs));

    Ok(AgentLoop::new(Arc::new(provider), tools).with_options(AgentOptions::from_config(config)))
}

/// Run a task, printing each step as it arrives. Ctrl-C cancels the run.
pub async fn handle_run(
    task: String,
    context: Option<String>,
    max_steps: Option<usize>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let mut agent = build_agent(config)?;
    if let Some(max_steps) = max_steps {
        let options = AgentOptions {
            max_steps,
            ..agent.options()
        };
        agent = agent.with_options(options);
    }

    if format == OutputFormat::Text {
        println!("Executing task: {}", task);
        println!();
    }

    let handle = agent.run_task(&task, context.as_deref());
    let last = drain_with_interrupt(handle, format).await?;

    match last.map(|step| step.kind) {
        Some(StepKind::Complete { .. }) => Ok(()),
        Some(StepKind::Error { content, .. }) => Err(anyhow::anyhow!(content)),
        _ => Err(anyhow::anyhow!("Run ended without a result")),
    }
}

/// Interactive conversation. Each line is one user turn; the session
/// persists across turns. `/reset` starts over, `/session` shows the shell
/// state and `/exit` quits.
pub async fn handle_chat(config: &Config, format: OutputFormat) -> Result<()> {
    let agent = build_agent(config)?;
    let session = Arc::clone(agent.tools().session());
    let prompt = system_prompt(agent.tools().platform().as_ref());
    let controller = RunController::new(agent);

    let mut messages = vec![Message::system(prompt.clone())];
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if format == OutputFormat::Text {
        println!("Agent Desktop chat. Type /exit to quit, /reset to start over.");
    }

    loop {
        if format == OutputFormat::Text {
            use std::io::Write;
            print!("> ");
            std::io::stdout().flush()?;
        }

        // Ctrl-C at an idle prompt ends the chat
        let read = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                if format == OutputFormat::Text {
                    println!();
                }
                break;
            }
        };
        let Some(line) = read else { break };
        let line = line.trim();

        match line {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                controller.cancel_active();
                session.reset();
                messages = vec![Message::system(prompt.clone())];
                println!("Conversation reset.");
                continue;
            }
            "/session" => {
                let info = session.info();
                match format {
                    OutputFormat::Text => {
                        println!("Working directory: {}", info.cwd.display());
                        println!("Commands run: {}", info.history_count);
                        for record in &info.last_commands {
                            println!("  [{}] {}", record.exit_code, record.command);
                        }
                    }
                    OutputFormat::Json => println!("{}", serde_json::to_string(&info)?),
                }
                continue;
            }
            _ => {}
        }

        messages.push(Message::user(line));
        let handle = controller.continue_conversation(messages.clone());
        let last = drain_with_interrupt(handle, format).await?;

        // Keep the conversation the run reported; on a bare cancellation
        // drop the unanswered user turn.
        match last.as_ref().and_then(Step::messages) {
            Some(updated) => messages = updated.to_vec(),
            None => {
                messages.pop();
            }
        }
    }

    Ok(())
}

/// Print the tool schemas
pub fn handle_tools(format: OutputFormat) -> Result<()> {
    let tools = tool_definitions();
    match format {
        OutputFormat::Text => {
            println!("Available tools ({}):", tools.len());
            for tool in tools {
                println!();
                println!("  {}", tool.name);
                println!("    {}", tool.description);
                for param in &tool.parameters {
                    let marker = if param.required { "required" } else { "optional" };
                    println!("    - {} ({}): {}", param.name, marker, param.description);
                }
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.to_json_schema(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Classify `command` and print the verdict
pub fn handle_check(command: &str, format: OutputFormat) -> Result<()> {
    let verdict = command_safety::classify(command);
    match format {
        OutputFormat::Text => match &verdict.reason {
            Some(reason) => println!("BLOCKED  {}", reason),
            None => println!("ALLOWED  {}", command.trim()),
        },
        OutputFormat::Json => {
            let output = json!({
                "command": command,
                "allowed": verdict.allowed,
                "reason": verdict.reason,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Validate configuration and check the model connection
pub async fn handle_doctor(
    config: &Config,
    config_path: &Path,
    format: OutputFormat,
) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(&str, String)> = Vec::new();

    // Config is already validated when loaded
    checks.push(("Configuration", config_path.display().to_string()));

    let host = platform::current();
    let (shell, _) = host.shell_invocation();
    checks.push(("Platform", format!("{} ({})", host.name(), shell)));
    checks.push(("Home directory", host.home_dir().display().to_string()));
    checks.push(("Step limit", config.max_steps().to_string()));

    match config.validate_llm() {
        Ok(()) => {
            checks.push(("LLM configuration", "Complete".to_string()));
            match AzureOpenAIProvider::from_config(config) {
                Ok(provider) => {
                    let (ok, message) =
                        llm::check_connection(&provider, provider.endpoint()).await;
                    checks.push((
                        "Connection",
                        if ok { "OK" } else { "Failed" }.to_string(),
                    ));
                    if !ok {
                        issues.push(message);
                    }
                }
                Err(e) => {
                    checks.push(("Connection", "Not attempted".to_string()));
                    issues.push(e.to_string());
                }
            }
        }
        Err(e) => {
            checks.push(("LLM configuration", "Incomplete".to_string()));
            issues.push(format!("{}. {}", e, e.user_hint()));
        }
    }

    match format {
        OutputFormat::Text => {
            println!("Agent Desktop Diagnostics");
            println!("=========================");
            println!();

            println!("System Checks:");
            for (check, status) in &checks {
                println!("  {:<20} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// What a Ctrl-C means while a run is streaming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Ask the run to stop and keep draining its steps
    Cancel,
    /// Give up on the run and leave the process
    Abort,
}

/// Counts Ctrl-C presses for one run
#[derive(Debug, Default)]
struct Interrupts {
    count: usize,
}

impl Interrupts {
    fn record(&mut self) -> Interrupt {
        self.count += 1;
        if self.count == 1 {
            Interrupt::Cancel
        } else {
            Interrupt::Abort
        }
    }
}

/// Print steps until the run ends. The first Ctrl-C cancels the run, a
/// second one returns an error so the process exits. Returns the terminal
/// step.
async fn drain_with_interrupt(mut handle: RunHandle, format: OutputFormat) -> Result<Option<Step>> {
    let mut last = None;
    let mut interrupts = Interrupts::default();

    loop {
        let step = tokio::select! {
            step = handle.recv() => step,
            _ = tokio::signal::ctrl_c() => {
                match interrupts.record() {
                    Interrupt::Cancel => {
                        handle.cancel();
                        if format == OutputFormat::Text {
                            eprintln!("Cancelling... press Ctrl-C again to quit.");
                        }
                        continue;
                    }
                    Interrupt::Abort => bail!("Interrupted"),
                }
            }
        };

        let Some(step) = step else { break };
        print_step(&step, format)?;
        if step.is_terminal() {
            last = Some(step);
        }
    }

    Ok(last)
}

fn print_step(step: &Step, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(step)?),
        OutputFormat::Text => {
            if let Some(text) = format_step_text(step) {
                println!("{}", text);
            }
        }
    }
    Ok(())
}

/// Human-readable rendering of one step; `None` for steps not worth showing
pub fn format_step_text(step: &Step) -> Option<String> {
    let n = step.step_number;
    let text = match &step.kind {
        StepKind::Thinking { content } => format!("[{}] 💭 {}", n, content),
        StepKind::ToolCall {
            name, arguments, ..
        } => {
            let args = serde_json::to_string(arguments).unwrap_or_default();
            format!("[{}] 🔧 {} {}", n, name, args)
        }
        StepKind::ToolResult { result, .. } => {
            let marker = if result.success { "✓" } else { "✗" };
            format!("[{}] {} {}", n, marker, result.display_content())
        }
        StepKind::AssistantMessage { content, .. } => content.clone(),
        StepKind::Complete { content, .. } => format!("\n{}", content),
        StepKind::Error { content, .. } => format!("[{}] ❌ {}", n, content),
        StepKind::Usage { .. } => return None,
    };
    Some(text)
}
