//! Breadth-first crawl of a rendering host into a static snapshot tree.
//!
//! # Architecture
//!
//! ```text
//!                coordinator (owns visited set, output map, frontier)
//!                     │
//!        level N ─────┼──────────────┬──────────────┐
//!                     ▼              ▼              ▼
//!                 worker 1       worker 2   ...  worker K     (rayon pool)
//!               fetch/write    fetch/write     fetch/write
//!               extract links  extract links   extract links
//!                     │              │              │
//!                     └──────── join barrier ───────┘
//!                     │
//!          merge links in frontier order -> level N+1
//! ```
//!
//! Workers never touch traversal state: they only report discovered routes.
//! Merging in frontier order keeps discovery, and therefore the returned
//! file list, deterministic regardless of `concurrency`.

mod fetch;
mod links;
mod output;
mod write;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use thiserror::Error;
use url::Url;

use crate::core::{Route, is_shutdown};
use crate::logger::ProgressLine;
use crate::utils::plural_count;
use crate::{debug, log};

use fetch::Fetcher;
use output::OutputMap;
pub use write::Variants;

/// Crawl errors. All of them abort the run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid base url `{0}`: expected an absolute http(s) url")]
    InvalidBaseUrl(String),

    #[error("failed to fetch {route}: {message}")]
    Fetch { route: Route, message: String },

    #[error("rendering host returned status {code} for {route}")]
    Status { route: Route, code: u16 },

    #[error("{route} redirects to `{location}`, outside the rendering host")]
    CrossOriginRedirect { route: Route, location: String },

    #[error("route {0} cannot be mapped to an output path")]
    Unmappable(Route),

    #[error("routes {route} and {other} both map to `{}`", .path.display())]
    PathCollision {
        route: Route,
        other: Route,
        path: PathBuf,
    },

    #[error("route {route} needs `{}` as a directory, but it is the snapshot of {other}", .path.display())]
    DirectoryConflict {
        route: Route,
        other: Route,
        path: PathBuf,
    },

    #[error("existing entry `{}` blocks the snapshot of {route}", .path.display())]
    OnDisk { route: Route, path: PathBuf },

    #[error("IO error on `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to start crawl workers: {0}")]
    ThreadPool(String),

    #[error("crawl interrupted")]
    Interrupted,
}

/// Crawl settings.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Origin of the rendering host; also the default link resolution base.
    pub base_url: Url,
    /// Root of the snapshot tree.
    pub output_root: PathBuf,
    pub variants: Variants,
    /// Worker threads per level.
    pub concurrency: usize,
    /// Extra attempts for transient failures.
    pub retries: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Show the in-place progress line.
    pub progress: bool,
}

impl CrawlOptions {
    pub fn new(base_url: Url, output_root: impl Into<PathBuf>) -> Self {
        Self {
            base_url,
            output_root: output_root.into(),
            variants: Variants::default(),
            concurrency: 1,
            retries: 0,
            timeout: Duration::from_secs(30),
            progress: false,
        }
    }
}

/// A route scheduled for fetching, with its reserved output path.
struct Job {
    route: Route,
    url: Url,
    relative: PathBuf,
}

/// What a worker reports back for one route.
struct Visited {
    path: PathBuf,
    links: Vec<Route>,
}

/// Crawl from `/` and write one snapshot per reachable route.
///
/// Returns the snapshot paths written, in discovery order. Compressed
/// variants are not included.
pub fn crawl(options: &CrawlOptions) -> Result<Vec<PathBuf>, CrawlError> {
    let base_url = &options.base_url;
    if !matches!(base_url.scheme(), "http" | "https") || base_url.host().is_none() {
        return Err(CrawlError::InvalidBaseUrl(base_url.to_string()));
    }
    let root = options.output_root.as_path();
    std::fs::create_dir_all(root).map_err(|err| CrawlError::Io(root.to_path_buf(), err))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.concurrency.max(1))
        .thread_name(|i| format!("crawl-{i}"))
        .build()
        .map_err(|err| CrawlError::ThreadPool(err.to_string()))?;
    let fetcher = Fetcher::new(options.timeout, options.retries);

    log!("crawl"; "crawling {}", base_url);

    let mut visited: FxHashSet<Route> = FxHashSet::default();
    let mut outputs = OutputMap::default();
    let mut written = Vec::new();

    let root_route = Route::root();
    visited.insert(root_route.clone());
    let mut frontier = vec![schedule(&mut outputs, base_url, root_route)?];

    let progress = ProgressLine::new(&["fetched", "queued"], options.progress);
    progress.set("queued", frontier.len());

    while !frontier.is_empty() {
        if is_shutdown() {
            return Err(CrawlError::Interrupted);
        }

        let results: Vec<Result<Visited, CrawlError>> = pool.install(|| {
            frontier
                .par_iter()
                .map(|job| {
                    let page = visit(job, &fetcher, options)?;
                    progress.inc("fetched");
                    Ok(page)
                })
                .collect()
        });

        let mut next = Vec::new();
        for result in results {
            let page = result?;
            written.push(page.path);

            for link in page.links {
                if visited.insert(link.clone()) {
                    debug!("crawl"; "queued {link}");
                    next.push(schedule(&mut outputs, base_url, link)?);
                }
            }
        }

        frontier = next;
        progress.set("queued", frontier.len());
    }

    progress.finish();
    log!("crawl"; "wrote {} to {}", plural_count(written.len(), "snapshot"), root.display());
    Ok(written)
}

/// Reserve the output path and build the fetch URL for a new route.
fn schedule(outputs: &mut OutputMap, base_url: &Url, route: Route) -> Result<Job, CrawlError> {
    let relative = outputs.reserve(&route)?;
    let url = base_url
        .join(route.as_str())
        .map_err(|_| CrawlError::Unmappable(route.clone()))?;
    Ok(Job {
        route,
        url,
        relative,
    })
}

/// Fetch, materialize and scan one route. Runs on a worker thread.
fn visit(job: &Job, fetcher: &Fetcher, options: &CrawlOptions) -> Result<Visited, CrawlError> {
    let body = fetcher.get(&job.route, &job.url)?;
    let path = write::write_snapshot(
        &options.output_root,
        &job.relative,
        &job.route,
        &body,
        options.variants,
    )?;
    debug!("crawl"; "{} -> {}", job.route, job.relative.display());

    let html = String::from_utf8_lossy(&body);
    let links = links::extract_routes(&html, &job.url, &options.base_url);
    Ok(Visited { path, links })
}

/// Compressed variants implied by the existing shell: gzip iff
/// `index.html.gz` exists next to it, brotli iff `index.html.br` does.
pub fn detect_variants(web_root: &Path) -> Variants {
    Variants {
        gzip: web_root.join("index.html.gz").is_file(),
        brotli: web_root.join("index.html.br").is_file(),
    }
}
