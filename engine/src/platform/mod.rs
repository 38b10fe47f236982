//! Platform capability layer
//!
//! Everything the engine needs to know about the host OS sits behind the
//! [`Platform`] trait: which shell runs commands, which paths count as
//! absolute, where the user's special folders live, and which command
//! dialect the model should be told to use.
//!
//! # Implementations
//!
//! - [`UnixPlatform`]: Linux and macOS. Commands run through `bash -c`.
//! - [`WindowsPlatform`]: commands run through `cmd /C`. `Desktop`,
//!   `Documents` and `Downloads` are looked up in the cloud-sync redirect
//!   roots (`OneDrive`, `OneDriveConsumer`, `OneDriveCommercial`) before the
//!   home directory.
//!
//! Both implementations are plain data and can be constructed on any host,
//! which keeps the Windows rules testable on Unix CI.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

/// Folder names that get special-folder treatment on Windows
const SPECIAL_FOLDERS: &[&str] = &["Desktop", "Documents", "Downloads"];

/// Environment variables pointing at cloud-sync folder redirection roots
const REDIRECT_VARS: &[&str] = &["OneDrive", "OneDriveConsumer", "OneDriveCommercial"];

/// OS-specific behavior used by the path resolver, the terminal tool and the
/// system prompt.
pub trait Platform: Send + Sync + fmt::Debug {
    /// Short platform name: `linux`, `macos` or `windows`
    fn name(&self) -> &'static str;

    /// Shell program and the flag that makes it execute one command string
    fn shell_invocation(&self) -> (&'static str, &'static str);

    /// Build the process that runs `command` through the platform shell
    fn shell_command(&self, command: &str) -> Command {
        let (shell, flag) = self.shell_invocation();
        let mut cmd = std::process::Command::new(shell);
        cmd.arg(flag).arg(command);
        cmd.into()
    }

    /// The user's home directory
    fn home_dir(&self) -> &Path;

    /// Resolve a special folder (`Desktop`, `Documents`, `Downloads`) to an
    /// existing directory. `None` when the platform has no such concept or
    /// the folder does not exist.
    fn special_folder(&self, name: &str) -> Option<PathBuf>;

    /// Whether `path` is absolute under this platform's rules
    fn is_absolute(&self, path: &str) -> bool;

    /// Whether `c` separates path segments
    fn is_separator(&self, c: char) -> bool;

    /// Command-dialect hint for the system prompt
    fn os_instructions(&self) -> &'static str;
}

/// Linux and macOS
#[derive(Debug, Clone)]
pub struct UnixPlatform {
    home: PathBuf,
    macos: bool,
}

impl UnixPlatform {
    pub fn linux(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            macos: false,
        }
    }

    pub fn macos(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            macos: true,
        }
    }

    /// Build for the running host
    pub fn from_env() -> Self {
        Self {
            home: home_dir(),
            macos: cfg!(target_os = "macos"),
        }
    }
}

impl Platform for UnixPlatform {
    fn name(&self) -> &'static str {
        if self.macos {
            "macos"
        } else {
            "linux"
        }
    }

    fn shell_invocation(&self) -> (&'static str, &'static str) {
        ("bash", "-c")
    }

    fn home_dir(&self) -> &Path {
        &self.home
    }

    fn special_folder(&self, _name: &str) -> Option<PathBuf> {
        None
    }

    fn is_absolute(&self, path: &str) -> bool {
        path.starts_with('/')
    }

    fn is_separator(&self, c: char) -> bool {
        c == '/'
    }

    fn os_instructions(&self) -> &'static str {
        if self.macos {
            "The user is on macOS, so use Unix-compatible commands (mv, cp, rm, ls, etc.) or Python scripts."
        } else {
            "The user is on Linux, so use Unix-compatible commands (mv, cp, rm, ls, etc.) or Python scripts."
        }
    }
}

/// Windows
#[derive(Debug, Clone)]
pub struct WindowsPlatform {
    home: PathBuf,
    redirect_roots: Vec<PathBuf>,
}

impl WindowsPlatform {
    /// Create with an explicit home and redirect roots, checked in order
    pub fn new(home: impl Into<PathBuf>, redirect_roots: Vec<PathBuf>) -> Self {
        Self {
            home: home.into(),
            redirect_roots,
        }
    }

    /// Build from the running host's home directory and `OneDrive*` variables
    pub fn from_env() -> Self {
        let redirect_roots = REDIRECT_VARS
            .iter()
            .filter_map(|var| std::env::var_os(var))
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .collect();

        Self::new(home_dir(), redirect_roots)
    }
}

impl Platform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn shell_invocation(&self) -> (&'static str, &'static str) {
        ("cmd", "/C")
    }

    /// `cmd` parses its own command line, so the command string is passed
    /// through unquoted on Windows hosts
    fn shell_command(&self, command: &str) -> Command {
        let (shell, flag) = self.shell_invocation();
        let mut cmd = std::process::Command::new(shell);
        cmd.arg(flag);
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.raw_arg(command);
        }
        #[cfg(not(windows))]
        cmd.arg(command);
        cmd.into()
    }

    fn home_dir(&self) -> &Path {
        &self.home
    }

    fn special_folder(&self, name: &str) -> Option<PathBuf> {
        let canonical = SPECIAL_FOLDERS
            .iter()
            .find(|folder| folder.eq_ignore_ascii_case(name))?;

        self.redirect_roots
            .iter()
            .chain(std::iter::once(&self.home))
            .map(|root| root.join(canonical))
            .find(|candidate| candidate.is_dir())
    }

    fn is_absolute(&self, path: &str) -> bool {
        let bytes = path.as_bytes();
        let drive_absolute = bytes.len() >= 3
            && bytes[0].is_ascii_alphabetic()
            && bytes[1] == b':'
            && (bytes[2] == b'\\' || bytes[2] == b'/');

        // UNC paths and rooted paths (`\foo`) count as absolute too
        drive_absolute || path.starts_with('\\') || path.starts_with('/')
    }

    fn is_separator(&self, c: char) -> bool {
        c == '\\' || c == '/'
    }

    fn os_instructions(&self) -> &'static str {
        "The user is on Windows, so use Windows-compatible commands (dir, copy, del, etc.), PowerShell commands, or Python scripts."
    }
}

/// The platform for the running host
pub fn current() -> Arc<dyn Platform> {
    if cfg!(windows) {
        Arc::new(WindowsPlatform::from_env())
    } else {
        Arc::new(UnixPlatform::from_env())
    }
}

/// The user's home directory, falling back to the process working directory
/// and finally to `.` when neither can be determined.
pub fn home_dir() -> PathBuf {
    dirs::home_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}
