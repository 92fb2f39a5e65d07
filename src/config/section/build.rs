//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! web_root = "wwwroot"                  # Shell index.html lives here, snapshots go here
//! halves = "obj/prerender/template.json" # Template halves handed to the rendering host
//! ```
//!
//! Both paths are relative to the config file's directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{ConfigDiagnostics, FieldPath};

/// Shell file name inside the web root.
pub const SHELL_FILE: &str = "index.html";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Published static files; receives the snapshot tree.
    pub web_root: PathBuf,

    /// Template halves JSON file.
    pub halves: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            web_root: "wwwroot".into(),
            halves: "obj/prerender/template.json".into(),
        }
    }
}

impl BuildConfig {
    pub const WEB_ROOT: FieldPath = FieldPath::new("build.web_root");
    pub const HALVES: FieldPath = FieldPath::new("build.halves");

    /// The shell document, `<web_root>/index.html`.
    pub fn shell(&self) -> PathBuf {
        self.web_root.join(SHELL_FILE)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.web_root.as_os_str().is_empty() {
            diag.error(Self::WEB_ROOT, "must not be empty");
        }
        if self.halves.file_name().is_none() {
            diag.error(Self::HALVES, "must name a file");
        }
    }
}
