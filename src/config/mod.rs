//! Pipeline configuration loaded from `prerender.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # One file per `[section]`
//! ├── types/         # ConfigError, diagnostics, field paths
//! ├── util.rs        # Config file lookup
//! └── mod.rs         # PrerenderConfig (this file)
//! ```
//!
//! The file is optional: every field has a default, and command line flags
//! override whatever the file says. Relative paths are resolved against the
//! directory holding the config file (or the current directory without one).

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{BuildConfig, CrawlConfig, HostConfig, ManifestConfig, TemplateConfig};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::cli::{Cli, PrerenderArgs};
use crate::crawl::CrawlOptions;
use crate::host::HostOptions;
use crate::utils::path::{normalize_path, resolve_against};
use crate::{debug, log};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Config file name looked up when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "prerender.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing prerender.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrerenderConfig {
    /// Absolute path to the config file, empty when running without one
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub template: TemplateConfig,

    #[serde(default)]
    pub crawl: CrawlConfig,

    #[serde(default)]
    pub manifest: ManifestConfig,

    #[serde(default)]
    pub host: HostConfig,
}

impl PrerenderConfig {
    /// Load configuration for the given command line.
    ///
    /// Searches upward from cwd for the config file. A missing default
    /// config is fine; a missing explicit `--config` is not.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let (mut config, root) = match find_config_file(&cli.config) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                let root = path.parent().map_or_else(|| cwd.clone(), Path::to_path_buf);
                config.config_path = normalize_path(&path);
                (config, root)
            }
            None if cli.config != Path::new(DEFAULT_CONFIG) => {
                bail!(ConfigError::Io(
                    cli.config.clone(),
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                ));
            }
            None => {
                debug!("config"; "no {} found, using defaults", DEFAULT_CONFIG);
                (Self::default(), cwd)
            }
        };

        crate::logger::set_verbose(cli.args().verbose);
        config.finalize(&root, cli.args());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {} are ignored:", display_path);
        for field in fields {
            eprintln!("- {field}");
        }
    }

    /// Apply command line overrides, then resolve paths against `root`.
    pub(crate) fn finalize(&mut self, root: &Path, args: &PrerenderArgs) {
        self.apply_args(args);

        let root = normalize_path(root);
        self.build.web_root = resolve_against(&self.build.web_root, &root);
        self.build.halves = resolve_against(&self.build.halves, &root);
        self.root = root;
    }

    fn apply_args(&mut self, args: &PrerenderArgs) {
        Self::update_option(&mut self.build.web_root, args.web_root.as_ref());
        Self::update_option(&mut self.template.selector, args.selector.as_ref());
        Self::update_option(
            &mut self.template.discard_loading_contents,
            args.discard_loading_contents.as_ref(),
        );
        Self::update_option(&mut self.crawl.base_url, args.base_url.as_ref());
        Self::update_option(&mut self.crawl.concurrency, args.concurrency.as_ref());
        Self::update_option(&mut self.crawl.retries, args.retries.as_ref());
        Self::update_option(&mut self.crawl.timeout, args.timeout.as_ref());
        Self::update_option(&mut self.manifest.path, args.manifest.as_ref());

        // Unset flags keep auto-detection (or the file's value)
        if args.gzip.is_some() {
            self.crawl.gzip = args.gzip;
        }
        if args.brotli.is_some() {
            self.crawl.brotli = args.brotli;
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        self.build.validate(&mut diag);
        self.template.validate(&mut diag);
        self.crawl.validate(&mut diag);
        self.host.validate(&mut diag);

        diag.into_result().map_err(ConfigError::Diagnostics)
    }

    // ========================================================================
    // derived settings
    // ========================================================================

    /// The shell document the halves are split from.
    pub fn shell_path(&self) -> PathBuf {
        self.build.shell()
    }

    /// Manifest location, `None` when the step is disabled.
    pub fn manifest_path(&self) -> Option<PathBuf> {
        self.manifest
            .is_enabled()
            .then(|| resolve_against(Path::new(self.manifest.path.trim()), &self.build.web_root))
    }

    fn base_url(&self) -> Result<Url> {
        self.crawl.url().with_context(|| {
            format!(
                "invalid {}: `{}`",
                CrawlConfig::BASE_URL.as_str(),
                self.crawl.base_url
            )
        })
    }

    /// Crawl settings; compression variants are detected at call time.
    pub fn crawl_options(&self, progress: bool) -> Result<CrawlOptions> {
        let mut options = CrawlOptions::new(self.base_url()?, &self.build.web_root);
        options.variants = self.crawl.variants(&self.build.web_root);
        options.concurrency = self.crawl.concurrency;
        options.retries = self.crawl.retries;
        options.timeout = self.crawl.timeout();
        options.progress = progress;
        Ok(options)
    }

    /// Host launch settings, `None` when the host is managed elsewhere.
    pub fn host_options(&self) -> Result<Option<HostOptions>> {
        if !self.host.is_managed() {
            return Ok(None);
        }
        Ok(Some(HostOptions {
            command: self.host.command.clone(),
            cwd: self.root.clone(),
            template: self.build.halves.clone(),
            web_root: self.build.web_root.clone(),
            base_url: self.base_url()?,
            middleware: self.host.middleware.clone(),
            ready_timeout: Duration::from_secs(self.host.ready_timeout),
            keep_running: self.host.keep_running,
        }))
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse a config snippet.
/// Panics if there are unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(extra: &str) -> PrerenderConfig {
    let (parsed, ignored) = PrerenderConfig::parse_with_ignored(extra).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
