//! Shell template splitting.
//!
//! Turns the application's shell document (`index.html`) into two halves
//! around the mount element, so that
//! `first + <rendered markup> + second` is the shell with the markup placed
//! as the last child of the mount element.
//!
//! # Pipeline
//!
//! ```text
//! shell text
//!   -> normalize line endings (\r\n, \r -> \n)
//!   -> excise previous prerendering block (idempotent re-runs)
//!   -> locate mount element by selector (lol_html)
//!   -> append insertion marker comment as last child
//!   -> split at the marker
//! ```
//!
//! Serialization is source preserving: apart from the inserted marker every
//! byte of the (normalized) shell is emitted as-is, so identical input always
//! yields byte-identical halves.

mod mount;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::atomic_write;

/// Opening line of a prerendering block emitted by the rendering host.
pub const PRERENDER_BEGIN: &str = "\n<!-- %%-PRERENDERING-BEGIN-%% -->\n";
/// Closing line of a prerendering block emitted by the rendering host.
pub const PRERENDER_END: &str = "\n<!-- %%-PRERENDERING-END-%% -->\n";

const MARKER_TEXT: &str = "%%-INSERT-PRERENDERING-HERE-%%";
const MARKER_COMMENT: &str = "<!--%%-INSERT-PRERENDERING-HERE-%%-->";

/// Template splitting errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("selector `{0}` does not match any element")]
    NoMatch(String),

    #[error("invalid mount selector `{0}`: {1}")]
    InvalidSelector(String, String),

    #[error("mount element <{0}> is a void element and cannot receive content")]
    VoidMount(String),

    #[error("mount element <{0}> has no closing tag")]
    UnclosedMount(String),

    #[error("prerendering markers are unbalanced (begin and end must both be present, in order)")]
    UnbalancedMarkers,

    #[error("shell document already contains the insertion marker `{MARKER_TEXT}`")]
    MarkerInShell,

    #[error("failed to parse shell document: {0}")]
    Parse(String),

    #[error("insertion marker missing after serialization")]
    MarkerMissing,

    #[error("IO error on `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("malformed template halves file `{}`", .0.display())]
    Json(PathBuf, #[source] serde_json::Error),
}

/// Splitting behaviour beyond the selector.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitOptions {
    /// Drop the mount element's existing children (e.g. a "Loading..."
    /// placeholder) so rendered markup replaces them instead of following.
    pub discard_loading_contents: bool,
}

/// The two halves of the shell around the insertion point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateHalves {
    pub first: String,
    pub second: String,
}

impl TemplateHalves {
    /// Plain concatenation `first + fragment + second`.
    pub fn inject(&self, fragment: &str) -> String {
        let mut out =
            String::with_capacity(self.first.len() + fragment.len() + self.second.len());
        out.push_str(&self.first);
        out.push_str(fragment);
        out.push_str(&self.second);
        out
    }

    /// Inject `markup` wrapped in a prerendering block.
    ///
    /// This is the document a rendering host serves; splitting it again
    /// yields the same halves.
    pub fn render(&self, markup: &str) -> String {
        self.inject(&format!("{PRERENDER_BEGIN}{markup}{PRERENDER_END}"))
    }

    /// Persist as `{ "first": ..., "second": ... }` for an out-of-process host.
    pub fn save(&self, path: &Path) -> Result<(), TemplateError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| TemplateError::Json(path.to_path_buf(), err))?;
        atomic_write(path, json.as_bytes()).map_err(|err| TemplateError::Io(path.to_path_buf(), err))
    }

    /// Load halves written by [`TemplateHalves::save`].
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let content =
            fs::read_to_string(path).map_err(|err| TemplateError::Io(path.to_path_buf(), err))?;
        serde_json::from_str(&content).map_err(|err| TemplateError::Json(path.to_path_buf(), err))
    }
}

/// Split `shell` around the first element matching `selector`.
pub fn split(shell: &str, selector: &str) -> Result<TemplateHalves, TemplateError> {
    split_with(shell, selector, SplitOptions::default())
}

/// Split with explicit options.
pub fn split_with(
    shell: &str,
    selector: &str,
    options: SplitOptions,
) -> Result<TemplateHalves, TemplateError> {
    let text = normalize_line_endings(shell);
    let text = strip_prerendering_block(&text)?;

    if text.contains(MARKER_TEXT) {
        return Err(TemplateError::MarkerInShell);
    }

    let mount = mount::find_mount(&text, selector)?;
    let keep_until = if options.discard_loading_contents {
        mount.open_end
    } else {
        mount.close_start
    };

    let mut serialized = String::with_capacity(text.len() + MARKER_COMMENT.len());
    serialized.push_str(&text[..keep_until]);
    serialized.push_str(MARKER_COMMENT);
    serialized.push_str(&text[mount.close_start..]);

    let index = serialized
        .find(MARKER_COMMENT)
        .ok_or(TemplateError::MarkerMissing)?;

    Ok(TemplateHalves {
        first: serialized[..index].to_string(),
        second: serialized[index + MARKER_COMMENT.len()..].to_string(),
    })
}

/// Read the shell from disk and split it.
pub fn split_file(
    path: &Path,
    selector: &str,
    options: SplitOptions,
) -> Result<TemplateHalves, TemplateError> {
    let shell =
        fs::read_to_string(path).map_err(|err| TemplateError::Io(path.to_path_buf(), err))?;
    split_with(&shell, selector, options)
}

/// Convert `\r\n` and lone `\r` to `\n`.
fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Remove a previous prerendering block, markers included.
///
/// Either both markers are present (begin before end) or neither is.
fn strip_prerendering_block(text: &str) -> Result<String, TemplateError> {
    match (text.find(PRERENDER_BEGIN), text.find(PRERENDER_END)) {
        (None, None) => Ok(text.to_string()),
        (Some(begin), Some(end)) if begin < end => {
            let mut out = String::with_capacity(text.len());
            out.push_str(&text[..begin]);
            out.push_str(&text[end + PRERENDER_END.len()..]);
            Ok(out)
        }
        _ => Err(TemplateError::UnbalancedMarkers),
    }
}
