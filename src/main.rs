//! Prerender - static snapshot prerendering for single-page applications.

mod cli;
mod config;
mod core;
mod crawl;
mod host;
mod logger;
mod manifest;
mod template;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands, build};
use config::PrerenderConfig;
use owo_colors::OwoColorize;

fn main() {
    if let Err(err) = run() {
        eprintln!("{} {err:#}", "[error]".red().bold());
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = PrerenderConfig::load(&cli)?;

    match &cli.command {
        Commands::Build { .. } => build::build(&config),
        Commands::Split { .. } => build::split_template(&config).map(|_| ()),
        Commands::Crawl { .. } => build::crawl_site(&config).map(|_| ()),
        Commands::Manifest { .. } => build::rehash(&config),
    }
}
