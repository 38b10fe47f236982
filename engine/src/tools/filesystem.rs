//! Filesystem tools
//!
//! Read, write, list, delete, copy and move, with every path resolved against
//! the session's working directory first.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::path::resolve_with;
use super::session::Session;
use super::ToolError;
use crate::platform::Platform;

#[derive(Debug, Clone)]
pub struct FilesystemTool {
    session: Arc<Session>,
    platform: Arc<dyn Platform>,
}

impl FilesystemTool {
    pub fn new(session: Arc<Session>, platform: Arc<dyn Platform>) -> Self {
        Self { session, platform }
    }

    /// Read a file, optionally keeping only the first `max_lines` lines
    pub async fn read_file(&self, path: &str, max_lines: Option<u64>) -> Result<String, ToolError> {
        let path = self.resolve(path);
        info!("Reading file: {}", path.display());

        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or(e, || ToolError::FileNotFound(path.clone())))?;
        if metadata.is_dir() {
            return Err(ToolError::NotAFile(path));
        }

        let bytes = fs::read(&path).await?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        debug!("Read {} bytes from {}", bytes.len(), path.display());

        Ok(match max_lines {
            Some(max) if max > 0 => truncate_lines(content, max as usize),
            _ => content,
        })
    }

    /// Write or append `content`, creating parent directories as needed
    pub async fn write_file(&self, path: &str, content: &str, append: bool) -> Result<String, ToolError> {
        let path = self.resolve(path);
        info!(
            "{} {} bytes to: {}",
            if append { "Appending" } else { "Writing" },
            content.len(),
            path.display()
        );

        create_parent_dirs(&path).await?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        let action = if append { "Appended to" } else { "Wrote" };
        Ok(format!("{} {} ({} bytes)", action, path.display(), content.len()))
    }

    /// List a directory, sorted by name. `None` or empty lists the working
    /// directory.
    pub async fn list_directory(&self, path: Option<&str>, show_hidden: bool) -> Result<String, ToolError> {
        let path = self.resolve(path.unwrap_or_default());
        info!("Listing directory: {}", path.display());

        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or(e, || ToolError::DirectoryNotFound(path.clone())))?;
        if !metadata.is_dir() {
            return Err(ToolError::NotADirectory(path));
        }

        let mut entries = Vec::new();
        let mut reader = fs::read_dir(&path).await?;
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !show_hidden && name.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type().await.map(|ft| ft.is_dir()).unwrap_or(false);
            let size = if is_dir {
                None
            } else {
                entry.metadata().await.ok().map(|m| m.len())
            };
            entries.push((name, is_dir, size));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let lines: Vec<String> = entries
            .into_iter()
            .map(|(name, is_dir, size)| match (is_dir, size) {
                (true, _) => format!("📁 {}/", name),
                (false, Some(size)) => format!("📄 {} ({})", name, format_size(size)),
                (false, None) => format!("📄 {}", name),
            })
            .collect();

        Ok(format!("Directory: {}\n\n{}", path.display(), lines.join("\n")))
    }

    /// Delete a single file. Refuses unless `confirm` is set, and refuses
    /// directories outright.
    pub async fn delete_file(&self, path: &str, confirm: bool) -> Result<String, ToolError> {
        if !confirm {
            return Err(ToolError::DeletionNotConfirmed);
        }

        let path = self.resolve(path);
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or(e, || ToolError::FileNotFound(path.clone())))?;
        if metadata.is_dir() {
            return Err(ToolError::IsDirectory(path));
        }

        info!("Deleting file: {}", path.display());
        fs::remove_file(&path).await?;
        Ok(format!("Deleted: {}", path.display()))
    }

    /// Copy a file, keeping its permission bits
    pub async fn copy_file(&self, source: &str, destination: &str) -> Result<String, ToolError> {
        let source = self.resolve(source);
        let destination = self.resolve(destination);

        let metadata = fs::metadata(&source)
            .await
            .map_err(|e| not_found_or(e, || ToolError::SourceNotFound(source.clone())))?;
        if metadata.is_dir() {
            return Err(ToolError::SourceNotAFile(source));
        }

        create_parent_dirs(&destination).await?;
        info!("Copying {} -> {}", source.display(), destination.display());
        // fs::copy carries the permission bits over
        fs::copy(&source, &destination).await?;

        Ok(format!("Copied: {} -> {}", source.display(), destination.display()))
    }

    /// Move or rename a file
    pub async fn move_file(&self, source: &str, destination: &str) -> Result<String, ToolError> {
        let source = self.resolve(source);
        let destination = self.resolve(destination);

        fs::metadata(&source)
            .await
            .map_err(|e| not_found_or(e, || ToolError::SourceNotFound(source.clone())))?;

        create_parent_dirs(&destination).await?;
        info!("Moving {} -> {}", source.display(), destination.display());
        fs::rename(&source, &destination).await?;

        Ok(format!("Moved: {} -> {}", source.display(), destination.display()))
    }

    fn resolve(&self, path: &str) -> PathBuf {
        resolve_with(self.platform.as_ref(), path, &self.session.cwd())
    }
}

fn not_found_or(error: std::io::Error, not_found: impl FnOnce() -> ToolError) -> ToolError {
    if error.kind() == ErrorKind::NotFound {
        not_found()
    } else {
        ToolError::Io(error)
    }
}

async fn create_parent_dirs(path: &Path) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::CreateDirectory(e.to_string()))?;
        }
    }
    Ok(())
}

fn truncate_lines(content: String, max_lines: usize) -> String {
    if content.split('\n').count() <= max_lines {
        return content;
    }
    let kept: Vec<&str> = content.split('\n').take(max_lines).collect();
    format!(
        "{}\n... (truncated, showing first {} lines)",
        kept.join("\n"),
        max_lines
    )
}

/// Format a byte count into a human-readable size string.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
