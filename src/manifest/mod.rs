//! Service worker asset manifest maintenance.
//!
//! The manifest is a script assigning a JSON object to `self.assetsManifest`:
//!
//! ```text
//! self.assetsManifest = {
//!   "version": "...",
//!   "assets": [
//!     { "hash": "sha256-...", "url": "index.html" },
//!     ...
//!   ]
//! };
//! ```
//!
//! After a crawl every snapshot gets an entry whose `hash` matches the bytes
//! on disk, so the service worker's integrity check accepts the prerendered
//! files instead of the original shell.

pub(crate) mod integrity;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::utils::atomic_write;
use crate::utils::path::relative_url;
use crate::{debug, log};

use integrity::file_integrity;

/// Default manifest location, relative to the web root.
pub const DEFAULT_MANIFEST: &str = "service-worker-assets.js";

// `\s` needs the unicode-perl feature, spell the ASCII class out instead
static ASSIGNMENT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t\r\n]*self\.assetsManifest[ \t\r\n]*=[ \t\r\n]*").unwrap()
});
static TERMINATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r";[ \t\r\n]*$").unwrap());

/// Manifest update errors. An absent manifest is not one of them.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error on `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("malformed asset manifest `{}`", .0.display())]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("unexpected asset manifest structure in `{}`: {}", .0.display(), .1)]
    Shape(PathBuf, &'static str),

    #[error("`{}` is outside the output root `{}`", .0.display(), .1.display())]
    OutsideRoot(PathBuf, PathBuf),
}

/// What an update changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestSummary {
    /// New entries appended.
    pub added: usize,
    /// Existing entries whose hash changed.
    pub updated: usize,
    /// Existing entries already up to date.
    pub unchanged: usize,
}

/// Parsed manifest plus the wrapping needed to write it back.
#[derive(Debug)]
struct ManifestDocument {
    /// Matched `self.assetsManifest = ` text, or `None` for bare JSON.
    prefix: Option<String>,
    root: Map<String, Value>,
}

impl ManifestDocument {
    fn parse(path: &Path, text: &str) -> Result<Self, ManifestError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let (prefix, body) = match ASSIGNMENT_PREFIX.find(text) {
            Some(found) => (Some(found.as_str().to_string()), &text[found.end()..]),
            None => (None, text),
        };
        let body = match TERMINATOR.find(body) {
            Some(found) => &body[..found.start()],
            None => body,
        };

        let value: Value =
            serde_json::from_str(body).map_err(|err| ManifestError::Json(path.to_path_buf(), err))?;
        let Value::Object(mut root) = value else {
            return Err(ManifestError::Shape(path.to_path_buf(), "top level is not an object"));
        };

        match root.get("assets") {
            None | Some(Value::Null) => {
                root.insert("assets".to_string(), Value::Array(Vec::new()));
            }
            Some(Value::Array(entries)) if entries.iter().all(Value::is_object) => {}
            Some(_) => {
                return Err(ManifestError::Shape(
                    path.to_path_buf(),
                    "`assets` is not an array of objects",
                ));
            }
        }

        Ok(Self { prefix, root })
    }

    /// Set `hash` on the entry for `url`, appending one if needed.
    fn upsert(&mut self, url: &str, hash: String, summary: &mut ManifestSummary) {
        // `parse` guarantees an array
        let Some(Value::Array(assets)) = self.root.get_mut("assets") else {
            return;
        };
        let existing = assets
            .iter_mut()
            .filter_map(Value::as_object_mut)
            .find(|entry| entry.get("url").and_then(Value::as_str) == Some(url));

        match existing {
            Some(entry) => {
                if entry.get("hash").and_then(Value::as_str) == Some(hash.as_str()) {
                    summary.unchanged += 1;
                } else {
                    entry.insert("hash".to_string(), Value::String(hash));
                    summary.updated += 1;
                }
            }
            None => {
                let mut entry = Map::new();
                entry.insert("hash".to_string(), Value::String(hash));
                entry.insert("url".to_string(), Value::String(url.to_string()));
                assets.push(Value::Object(entry));
                summary.added += 1;
            }
        }
    }

    fn render(&self) -> String {
        // Serializing a Map<String, Value> cannot fail
        let json = serde_json::to_string_pretty(&self.root).unwrap_or_default();
        match &self.prefix {
            Some(prefix) => format!("{prefix}{json};\n"),
            None => format!("{json}\n"),
        }
    }
}

/// Refresh the manifest entries of `written` snapshots.
///
/// Returns `Ok(None)` without touching anything when no manifest is
/// configured or the file does not exist. Hashes are computed from the
/// files' current bytes. The manifest is rewritten atomically, and only when
/// its content changes.
pub fn update(
    manifest: Option<&Path>,
    output_root: &Path,
    written: &[PathBuf],
) -> Result<Option<ManifestSummary>, ManifestError> {
    let Some(path) = manifest else {
        debug!("manifest"; "no manifest configured");
        return Ok(None);
    };
    if !path.is_file() {
        debug!("manifest"; "{} not found, skipping", path.display());
        return Ok(None);
    }

    let text = fs::read_to_string(path).map_err(|err| ManifestError::Io(path.to_path_buf(), err))?;
    let mut document = ManifestDocument::parse(path, &text)?;

    let mut summary = ManifestSummary::default();
    for file in written {
        let url = relative_url(file, output_root)
            .ok_or_else(|| ManifestError::OutsideRoot(file.clone(), output_root.to_path_buf()))?;
        let hash = file_integrity(file).map_err(|err| ManifestError::Io(file.clone(), err))?;
        document.upsert(&url, hash, &mut summary);
    }

    let rendered = document.render();
    if rendered != text {
        atomic_write(path, rendered.as_bytes())
            .map_err(|err| ManifestError::Io(path.to_path_buf(), err))?;
    }

    log!("manifest"; "{}: {} added, {} updated, {} unchanged",
        path.display(), summary.added, summary.updated, summary.unchanged);
    Ok(Some(summary))
}
