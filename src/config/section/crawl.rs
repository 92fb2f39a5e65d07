//! `[crawl]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [crawl]
//! base_url = "http://127.0.0.1:5050"  # Where the rendering host answers
//! gzip = true                         # Omit to auto-detect from index.html.gz
//! brotli = true                       # Omit to auto-detect from index.html.br
//! concurrency = 4                     # Routes fetched in parallel per level
//! retries = 2                         # Extra attempts on transport errors / 5xx
//! timeout = 30                        # Per-request timeout in seconds
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::crawl::{Variants, detect_variants};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub base_url: String,

    /// `None` means auto-detect.
    pub gzip: Option<bool>,

    /// `None` means auto-detect.
    pub brotli: Option<bool>,

    pub concurrency: usize,

    pub retries: u32,

    /// Seconds.
    pub timeout: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5050".into(),
            gzip: None,
            brotli: None,
            concurrency: 1,
            retries: 0,
            timeout: 30,
        }
    }
}

impl CrawlConfig {
    pub const BASE_URL: FieldPath = FieldPath::new("crawl.base_url");
    pub const CONCURRENCY: FieldPath = FieldPath::new("crawl.concurrency");
    pub const TIMEOUT: FieldPath = FieldPath::new("crawl.timeout");

    /// Parsed base URL, `None` if it is not an absolute http(s) URL.
    pub fn url(&self) -> Option<Url> {
        let url = Url::parse(&self.base_url).ok()?;
        let web = matches!(url.scheme(), "http" | "https") && url.host_str().is_some();
        web.then_some(url)
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Explicit settings win, the rest follow the shell's existing variants.
    pub fn variants(&self, web_root: &Path) -> Variants {
        let detected = detect_variants(web_root);
        Variants {
            gzip: self.gzip.unwrap_or(detected.gzip),
            brotli: self.brotli.unwrap_or(detected.brotli),
        }
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.url().is_none() {
            diag.error_with_hint(
                Self::BASE_URL,
                format!("`{}` is not an absolute http(s) url", self.base_url),
                "e.g. base_url = \"http://127.0.0.1:5050\"",
            );
        }
        if self.concurrency == 0 {
            diag.error(Self::CONCURRENCY, "must be at least 1");
        }
        if self.timeout == 0 {
            diag.error(Self::TIMEOUT, "must be at least 1 second");
        }
    }
}
