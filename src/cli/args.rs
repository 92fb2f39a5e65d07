//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Static snapshot prerenderer
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: prerender.toml, searched upward)
    #[arg(short = 'C', long, global = true, default_value = "prerender.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Split the shell, launch the host, crawl and update the manifest
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        args: PrerenderArgs,
    },

    /// Write the template halves only
    Split {
        #[command(flatten)]
        args: PrerenderArgs,
    },

    /// Crawl an already running host and update the manifest
    #[command(visible_alias = "c")]
    Crawl {
        #[command(flatten)]
        args: PrerenderArgs,
    },

    /// Rehash the snapshots found under the web root
    #[command(visible_alias = "m")]
    Manifest {
        #[command(flatten)]
        args: PrerenderArgs,
    },
}

/// Shared pipeline arguments; each overrides the matching config value.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PrerenderArgs {
    /// Web root holding the shell `index.html` and receiving snapshots
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub web_root: Option<PathBuf>,

    /// Mount element selector (e.g. `#app,app`)
    #[arg(short, long)]
    pub selector: Option<String>,

    /// Drop the mount element's loading placeholder from the halves
    #[arg(short = 'D', long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub discard_loading_contents: Option<bool>,

    /// Rendering host URL
    #[arg(short = 'U', long, value_hint = clap::ValueHint::Url)]
    pub base_url: Option<String>,

    /// Write `.gz` variants (default: auto-detect from `index.html.gz`)
    #[arg(short = 'z', long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub gzip: Option<bool>,

    /// Write `.br` variants (default: auto-detect from `index.html.br`)
    #[arg(short = 'B', long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub brotli: Option<bool>,

    /// Routes fetched in parallel per crawl level
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Extra attempts for transport errors and 5xx responses
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Asset manifest path relative to the web root (empty string disables)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub manifest: Option<String>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

impl Cli {
    pub const fn args(&self) -> &PrerenderArgs {
        match &self.command {
            Commands::Build { args }
            | Commands::Split { args }
            | Commands::Crawl { args }
            | Commands::Manifest { args } => args,
        }
    }
}
