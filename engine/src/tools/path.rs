//! Path resolution against a session's working directory
//!
//! Rules, first match wins:
//!
//! 1. empty: the working directory itself
//! 2. `~`, `~/rest`, `~\rest`: the home directory
//! 3. absolute under the platform's rules: unchanged
//! 4. `./rest` (or `.\rest` on Windows): `rest` joined to the working directory
//! 5. Windows special folders (`Desktop`, `Documents`, `Downloads`) as the
//!    first segment, when they resolve to an existing directory
//! 6. anything else: joined to the working directory
//!
//! Joined results are cleaned lexically (`.` dropped, `..` folded), so a
//! resolved path is itself absolute and resolving it again is a no-op.

use crate::platform::{self, Platform};
use std::path::{Component, Path, PathBuf};

/// Resolve `path` against `cwd` using the host platform
pub fn resolve(path: &str, cwd: &Path) -> PathBuf {
    resolve_with(platform::current().as_ref(), path, cwd)
}

/// Resolve `path` against `cwd` using an explicit platform
pub fn resolve_with(platform: &dyn Platform, path: &str, cwd: &Path) -> PathBuf {
    if path.is_empty() {
        return cwd.to_path_buf();
    }

    if let Some(rest) = path.strip_prefix('~') {
        let home = platform.home_dir();
        if rest.is_empty() {
            return home.to_path_buf();
        }
        if let Some(rest) = rest.strip_prefix('/').or_else(|| rest.strip_prefix('\\')) {
            return join_segments(platform, home, rest);
        }
    }

    if platform.is_absolute(path) {
        return PathBuf::from(path);
    }

    let mut chars = path.chars();
    if chars.next() == Some('.') && chars.next().is_some_and(|c| platform.is_separator(c)) {
        return join_segments(platform, cwd, &path[2..]);
    }

    if let Some(resolved) = resolve_special_folder(platform, path) {
        return resolved;
    }

    join_segments(platform, cwd, path)
}

fn resolve_special_folder(platform: &dyn Platform, path: &str) -> Option<PathBuf> {
    let (first, rest) = match path.find(|c| platform.is_separator(c)) {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => (path, ""),
    };

    let folder = platform.special_folder(first)?;
    Some(join_segments(platform, &folder, rest))
}

/// Join separator-delimited `rest` onto `base`, then clean the result
fn join_segments(platform: &dyn Platform, base: &Path, rest: &str) -> PathBuf {
    let mut joined = base.to_path_buf();
    for segment in rest.split(|c| platform.is_separator(c)) {
        if !segment.is_empty() {
            joined.push(segment);
        }
    }
    clean(&joined)
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding normal component. `..` at the root stays at the root.
pub fn clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other.as_os_str()),
        }
    }

    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}
