//! Output-root relative URLs.

use std::path::{Component, Path};

/// Express `path` relative to `root` as a forward-slash URL.
///
/// Platform separators never leak into the result, so the same tree yields
/// the same URLs on Windows and Unix. Returns `None` when `path` is not
/// inside `root`.
///
/// # Examples
/// ```ignore
/// relative_url(Path::new("/www/about/index.html"), Path::new("/www"))
///     == Some("about/index.html".to_string())
/// ```
pub fn relative_url(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
