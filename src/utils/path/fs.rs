//! Path normalization utilities.
//!
//! - `normalize_path` - file system paths (canonicalize + fallback)
//! - `resolve_against` - tilde expansion + resolution against a root

use std::path::{Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Resolve a configured path against `root`.
///
/// `~` is expanded first; absolute results are kept, relative ones are
/// joined onto `root`. The result is always absolute.
pub fn resolve_against(path: &Path, root: &Path) -> PathBuf {
    let expanded = match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
        None => path.to_path_buf(),
    };

    if expanded.is_absolute() {
        normalize_path(&expanded)
    } else {
        normalize_path(&root.join(expanded))
    }
}
