//! Tool registry and dispatcher
//!
//! Declares the fixed tool set offered to the model and routes each call to
//! its implementation. `execute` never fails: parse errors, policy
//! rejections and OS errors all come back as a failed [`ToolResult`] so the
//! model can read the error and correct itself.

pub mod args;
pub mod filesystem;
pub mod path;
pub mod session;
pub mod terminal;

pub use args::ToolArgs;
pub use filesystem::FilesystemTool;
pub use session::{CommandRecord, Session, SessionInfo};
pub use terminal::TerminalTool;

use sdk::{ParamType, ToolParameter, ToolResult, ToolSchema};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::platform::{self, Platform};

/// Name of the tool that ends a run
pub const TASK_COMPLETE: &str = "task_complete";

/// Default `run_command` timeout
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Failure inside a tool body. Rendered into [`ToolResult::error`] at the
/// dispatch boundary.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Not a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Source is not a file: {}", .0.display())]
    SourceNotAFile(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Deletion not confirmed. Set confirm=true to delete the file.")]
    DeletionNotConfirmed,

    #[error("Cannot delete directory with delete_file. Use run_command for directories: {}", .0.display())]
    IsDirectory(PathBuf),

    #[error("Failed to create directory: {0}")]
    CreateDirectory(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Registry of the built-in tools, bound to one session
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    session: Arc<Session>,
    platform: Arc<dyn Platform>,
    fs: FilesystemTool,
    terminal: TerminalTool,
    default_timeout: Duration,
}

impl ToolRegistry {
    /// Create a registry for `session` on the host platform
    pub fn new(session: Arc<Session>) -> Self {
        Self::with_platform(session, platform::current())
    }

    /// Create a registry with an explicit platform
    pub fn with_platform(session: Arc<Session>, platform: Arc<dyn Platform>) -> Self {
        Self {
            fs: FilesystemTool::new(Arc::clone(&session), Arc::clone(&platform)),
            terminal: TerminalTool::new(Arc::clone(&session), Arc::clone(&platform)),
            session,
            platform,
            default_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Override the timeout used when `run_command` gives none
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// Schemas of every tool, in prompt order
    pub fn definitions(&self) -> &'static [ToolSchema] {
        tool_definitions()
    }

    /// Execute one tool call
    pub async fn execute(&self, name: &str, args: &Map<String, Value>) -> ToolResult {
        debug!(tool = name, "Dispatching tool");

        let parsed = match ToolArgs::parse(name, args) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(tool = name, "Rejected tool call: {}", e);
                return ToolResult::error(e.to_string());
            }
        };

        let result = match parsed {
            ToolArgs::RunCommand(a) => {
                let timeout = match a.timeout {
                    Some(secs) if secs > 0 => Duration::from_secs(secs),
                    _ => self.default_timeout,
                };
                return self
                    .terminal
                    .execute(&a.command, a.working_dir.as_deref(), timeout)
                    .await;
            }
            ToolArgs::ReadFile(a) => self.fs.read_file(&a.path, a.max_lines).await,
            ToolArgs::WriteFile(a) => self.fs.write_file(&a.path, &a.content, a.append).await,
            ToolArgs::ListDirectory(a) => {
                self.fs
                    .list_directory(a.path.as_deref(), a.show_hidden)
                    .await
            }
            ToolArgs::GetCurrentDirectory => Ok(self.terminal.current_directory()),
            ToolArgs::ChangeDirectory(a) => self.terminal.change_directory(&a.path).await,
            ToolArgs::DeleteFile(a) => self.fs.delete_file(&a.path, a.confirm).await,
            ToolArgs::CopyFile(a) => self.fs.copy_file(&a.source, &a.destination).await,
            ToolArgs::MoveFile(a) => self.fs.move_file(&a.source, &a.destination).await,
            ToolArgs::TaskComplete(a) => Ok(task_complete_output(&a.summary, &a.files_modified)),
        };

        match result {
            Ok(output) => ToolResult::ok(output),
            Err(e) => {
                warn!(tool = name, "Tool failed: {}", e);
                ToolResult::error(e.to_string())
            }
        }
    }
}

/// Completion message shown when the model calls `task_complete`
pub fn task_complete_output(summary: &str, files_modified: &[String]) -> String {
    let mut output = format!("✅ Task completed!\n\n{}", summary);
    if !files_modified.is_empty() {
        output.push_str("\n\nFiles modified:\n");
        for file in files_modified {
            output.push_str(&format!("  • {}\n", file));
        }
    }
    output
}

static TOOL_DEFINITIONS: OnceLock<Vec<ToolSchema>> = OnceLock::new();

/// The fixed tool set
pub fn tool_definitions() -> &'static [ToolSchema] {
    TOOL_DEFINITIONS.get_or_init(|| {
        vec![
            ToolSchema::new(
                "run_command",
                "Execute a shell command and return the output. Use this to run any command-line operation.",
                vec![
                    ToolParameter::required("command", ParamType::String, "The shell command to execute"),
                    ToolParameter::optional(
                        "working_dir",
                        ParamType::String,
                        "Directory to run the command in. If not specified, uses the current working directory.",
                    ),
                    ToolParameter::optional(
                        "timeout",
                        ParamType::Integer,
                        "Maximum time in seconds to wait for the command. Default is 60.",
                    )
                    .with_default(json!(60)),
                ],
            ),
            ToolSchema::new(
                "read_file",
                "Read the contents of a file.",
                vec![
                    ToolParameter::required("path", ParamType::String, "Path to the file to read"),
                    ToolParameter::optional(
                        "max_lines",
                        ParamType::Integer,
                        "Maximum number of lines to read. If not specified, reads entire file.",
                    ),
                ],
            ),
            ToolSchema::new(
                "write_file",
                "Write content to a file. Creates the file if it doesn't exist.",
                vec![
                    ToolParameter::required("path", ParamType::String, "Path to the file to write"),
                    ToolParameter::required("content", ParamType::String, "Content to write to the file"),
                    ToolParameter::optional(
                        "append",
                        ParamType::Boolean,
                        "If true, append to the file instead of overwriting. Default is false.",
                    )
                    .with_default(json!(false)),
                ],
            ),
            ToolSchema::new(
                "list_directory",
                "List files and directories in a path.",
                vec![
                    ToolParameter::optional(
                        "path",
                        ParamType::String,
                        "Path to the directory to list. Defaults to current working directory.",
                    ),
                    ToolParameter::optional(
                        "show_hidden",
                        ParamType::Boolean,
                        "Whether to show hidden files (starting with .). Default is false.",
                    )
                    .with_default(json!(false)),
                ],
            ),
            ToolSchema::new(
                "get_current_directory",
                "Get the current working directory.",
                vec![],
            ),
            ToolSchema::new(
                "change_directory",
                "Change the current working directory.",
                vec![ToolParameter::required("path", ParamType::String, "Path to change to")],
            ),
            ToolSchema::new(
                "delete_file",
                "Delete a file. Use with caution.",
                vec![
                    ToolParameter::required("path", ParamType::String, "Path to the file to delete"),
                    ToolParameter::required("confirm", ParamType::Boolean, "Must be true to confirm deletion"),
                ],
            ),
            ToolSchema::new(
                "copy_file",
                "Copy a file to a new location.",
                vec![
                    ToolParameter::required("source", ParamType::String, "Path to the source file"),
                    ToolParameter::required("destination", ParamType::String, "Path to the destination"),
                ],
            ),
            ToolSchema::new(
                "move_file",
                "Move or rename a file.",
                vec![
                    ToolParameter::required("source", ParamType::String, "Path to the source file"),
                    ToolParameter::required("destination", ParamType::String, "Path to the destination"),
                ],
            ),
            ToolSchema::new(
                TASK_COMPLETE,
                "Call this when you have completed the user's task. Provide a summary of what was done.",
                vec![
                    ToolParameter::required("summary", ParamType::String, "A summary of what was accomplished"),
                    ToolParameter::optional(
                        "files_modified",
                        ParamType::Array,
                        "List of files that were created or modified",
                    ),
                ],
            ),
        ]
    })
}
