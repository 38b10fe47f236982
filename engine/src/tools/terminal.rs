//! Terminal tool
//!
//! Runs commands through the platform shell in the session's working
//! directory. Every command passes the safety filter first. The child is
//! spawned with `kill_on_drop`, so hitting the timeout kills it.

use sdk::ToolResult;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::path::resolve_with;
use super::session::Session;
use super::ToolError;
use crate::command_safety;
use crate::platform::Platform;

/// Exit code recorded when the process never produced one
const NO_EXIT_CODE: i32 = -1;

#[derive(Debug, Clone)]
pub struct TerminalTool {
    session: Arc<Session>,
    platform: Arc<dyn Platform>,
}

impl TerminalTool {
    pub fn new(session: Arc<Session>, platform: Arc<dyn Platform>) -> Self {
        Self { session, platform }
    }

    /// Run `command` through the platform shell.
    ///
    /// Output is stdout followed by stderr. On success trailing newlines are
    /// trimmed; on failure the untrimmed output is kept next to the error.
    /// Every command that reaches the shell is recorded in session history.
    pub async fn execute(
        &self,
        command: &str,
        working_dir: Option<&str>,
        timeout: Duration,
    ) -> ToolResult {
        let verdict = command_safety::classify(command);
        if !verdict.allowed {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "Command blocked".to_string());
            warn!(command, "Refusing to run blocked command");
            return ToolResult::error(reason);
        }

        let cwd = match working_dir {
            Some(dir) if !dir.is_empty() => {
                resolve_with(self.platform.as_ref(), dir, &self.session.cwd())
            }
            _ => self.session.cwd(),
        };

        info!("Executing command: {} (in {})", command, cwd.display());

        let child = self
            .platform
            .shell_command(command)
            .current_dir(&cwd)
            .envs(self.session.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                self.session.record(command, NO_EXIT_CODE);
                warn!("Failed to start command: {}", e);
                return ToolResult::error(format!(
                    "Command failed with exit code {}: {}",
                    NO_EXIT_CODE, e
                ));
            }
        };

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                self.session.record(command, NO_EXIT_CODE);
                warn!("Command I/O failed: {}", e);
                return ToolResult::error(format!(
                    "Command failed with exit code {}: {}",
                    NO_EXIT_CODE, e
                ));
            }
            Err(_) => {
                self.session.record(command, NO_EXIT_CODE);
                let err_msg = format!("Command timed out after {} seconds", timeout.as_secs());
                warn!("{}", err_msg);
                return ToolResult::error(err_msg);
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        let exit_code = output.status.code().unwrap_or(NO_EXIT_CODE);
        self.session.record(command, exit_code);

        if output.status.success() {
            debug!("Command succeeded");
            ToolResult::ok(combined.trim_end_matches(|c| c == '\r' || c == '\n'))
        } else {
            warn!(exit_code, "Command failed");
            ToolResult::failed_with_output(
                combined,
                format!("Command failed with exit code {}", exit_code),
            )
        }
    }

    /// The session's working directory
    pub fn current_directory(&self) -> String {
        self.session.cwd().display().to_string()
    }

    /// Change the session's working directory. The target must be an
    /// existing directory; on failure the working directory is untouched.
    pub async fn change_directory(&self, path: &str) -> Result<String, ToolError> {
        let target = resolve_with(self.platform.as_ref(), path, &self.session.cwd());
        let target = if target.is_absolute() {
            target
        } else {
            std::path::absolute(&target)?
        };

        let metadata = tokio::fs::metadata(&target).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::DirectoryNotFound(target.clone())
            } else {
                ToolError::Io(e)
            }
        })?;
        if !metadata.is_dir() {
            return Err(ToolError::NotADirectory(target));
        }

        info!("Changing directory to: {}", target.display());
        self.session.set_cwd(target.clone());
        Ok(format!("Changed directory to: {}", target.display()))
    }
}
