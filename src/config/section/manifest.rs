//! `[manifest]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [manifest]
//! path = "service-worker-assets.js"  # Relative to web_root, "" disables
//! ```
//!
//! A configured manifest that does not exist on disk is skipped silently.

use serde::{Deserialize, Serialize};

use crate::manifest::DEFAULT_MANIFEST;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    pub path: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_MANIFEST.into(),
        }
    }
}

impl ManifestConfig {
    pub fn is_enabled(&self) -> bool {
        !self.path.trim().is_empty()
    }
}
