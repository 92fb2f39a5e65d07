//! `[template]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [template]
//! selector = "#app,app"             # First match in document order wins
//! discard_loading_contents = false  # Drop the mount element's placeholder
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::template::SplitOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// CSS selector (or comma separated list) for the mount element.
    pub selector: String,

    pub discard_loading_contents: bool,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            selector: "#app".into(),
            discard_loading_contents: false,
        }
    }
}

impl TemplateConfig {
    pub const SELECTOR: FieldPath = FieldPath::new("template.selector");

    pub const fn split_options(&self) -> SplitOptions {
        SplitOptions {
            discard_loading_contents: self.discard_loading_contents,
        }
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.selector.trim().is_empty() {
            diag.error_with_hint(
                Self::SELECTOR,
                "must not be empty",
                "e.g. selector = \"#app\"",
            );
        }
    }
}
