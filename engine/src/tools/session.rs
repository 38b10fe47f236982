//! Shell session state shared by every tool invocation in a run
//!
//! Holds the working directory, a snapshot of the inherited environment and
//! the command history. Internally synchronized so hosts can read it for
//! display while a run is mutating it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Number of trailing commands reported by [`Session::info`]
const INFO_HISTORY_LEN: usize = 5;

/// One executed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    pub command: String,
    /// Working directory at the time the command ran
    pub cwd: PathBuf,
    /// Process exit code, `-1` when the process could not be started or was killed
    pub exit_code: i32,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of session state for display
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub cwd: PathBuf,
    pub history_count: usize,
    pub last_commands: Vec<CommandRecord>,
}

#[derive(Debug)]
struct SessionState {
    cwd: PathBuf,
    history: Vec<CommandRecord>,
}

/// Mutable shell session
#[derive(Debug)]
pub struct Session {
    home: PathBuf,
    env: HashMap<OsString, OsString>,
    state: RwLock<SessionState>,
}

impl Session {
    /// Create a session rooted at `home`, inheriting the process environment
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            env: std::env::vars_os().collect(),
            state: RwLock::new(SessionState {
                cwd: home.clone(),
                history: Vec::new(),
            }),
            home,
        }
    }

    /// Create a session rooted at the user's home directory
    pub fn from_env() -> Self {
        Self::new(crate::platform::home_dir())
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Current working directory
    pub fn cwd(&self) -> PathBuf {
        self.state.read().expect("Session lock poisoned").cwd.clone()
    }

    /// Replace the working directory. Callers validate the target first.
    pub(crate) fn set_cwd(&self, cwd: PathBuf) {
        self.state.write().expect("Session lock poisoned").cwd = cwd;
    }

    /// Inherited environment passed to every spawned command
    pub fn env(&self) -> &HashMap<OsString, OsString> {
        &self.env
    }

    /// Append a command to history, stamped with the current directory
    pub fn record(&self, command: &str, exit_code: i32) {
        let mut state = self.state.write().expect("Session lock poisoned");
        let record = CommandRecord {
            command: command.to_string(),
            cwd: state.cwd.clone(),
            exit_code,
            timestamp: Utc::now(),
        };
        state.history.push(record);
    }

    /// Full command history, oldest first
    pub fn history(&self) -> Vec<CommandRecord> {
        self.state.read().expect("Session lock poisoned").history.clone()
    }

    /// Restore the home directory and clear history
    pub fn reset(&self) {
        let mut state = self.state.write().expect("Session lock poisoned");
        state.cwd = self.home.clone();
        state.history.clear();
        tracing::debug!(cwd = %self.home.display(), "Session reset");
    }

    /// Working directory, history size and the last few commands
    pub fn info(&self) -> SessionInfo {
        let state = self.state.read().expect("Session lock poisoned");
        let skip = state.history.len().saturating_sub(INFO_HISTORY_LEN);
        SessionInfo {
            cwd: state.cwd.clone(),
            history_count: state.history.len(),
            last_commands: state.history[skip..].to_vec(),
        }
    }
}
