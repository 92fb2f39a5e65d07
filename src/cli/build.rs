//! Pipeline orchestration for the `build`, `split`, `crawl` and `manifest`
//! commands.
//!
//! Build pipeline phases:
//! - **Split** - Shell `index.html` -> template halves JSON
//! - **Host** - Launch the rendering host (when `[host] command` is set)
//! - **Crawl** - Breadth-first snapshot of every reachable route
//! - **Manifest** - Refresh integrity hashes of the written snapshots
//!
//! The shell is split before the crawl because the root snapshot replaces
//! `<web_root>/index.html`.

use crate::{
    config::PrerenderConfig,
    crawl::crawl,
    host::HostProcess,
    log,
    logger::is_verbose,
    manifest,
    template::{TemplateHalves, split_file},
    utils::plural_count,
};
use anyhow::{Context, Result};
use jwalk::WalkDir;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Split, (launch the host,) crawl, and update the manifest.
pub fn build(config: &PrerenderConfig) -> Result<()> {
    split_template(config)?;

    let host = match config.host_options()? {
        Some(options) => Some(HostProcess::launch(&options).context("rendering host failed")?),
        None => None,
    };

    crawl_site(config)?;

    if let Some(host) = host {
        host.finish().context("rendering host failed")?;
    }
    Ok(())
}

/// Split the shell and persist the halves for the rendering host.
pub fn split_template(config: &PrerenderConfig) -> Result<TemplateHalves> {
    let shell = config.shell_path();
    let halves = split_file(
        &shell,
        &config.template.selector,
        config.template.split_options(),
    )
    .with_context(|| format!("failed to split `{}`", shell.display()))?;

    halves
        .save(&config.build.halves)
        .context("failed to save template halves")?;

    log!("split"; "{} -> {}", shell.display(), config.build.halves.display());
    Ok(halves)
}

/// Crawl a running host, then update the manifest with what was written.
pub fn crawl_site(config: &PrerenderConfig) -> Result<Vec<PathBuf>> {
    let progress = std::io::stdout().is_terminal() && !is_verbose();
    let options = config.crawl_options(progress)?;

    let written = crawl(&options).context("crawl failed")?;

    update_manifest(config, &written)?;
    Ok(written)
}

/// Rehash the snapshots already present under the web root.
pub fn rehash(config: &PrerenderConfig) -> Result<()> {
    let snapshots = collect_snapshots(&config.build.web_root);
    log!("manifest"; "found {}", plural_count(snapshots.len(), "snapshot"));
    update_manifest(config, &snapshots)
}

fn update_manifest(config: &PrerenderConfig, written: &[PathBuf]) -> Result<()> {
    let path = config.manifest_path();
    manifest::update(path.as_deref(), &config.build.web_root, written)
        .context("failed to update asset manifest")?;
    Ok(())
}

/// Every `index.html` under `web_root` whose directories form a route,
/// in sorted order.
fn collect_snapshots(web_root: &Path) -> Vec<PathBuf> {
    let mut snapshots: Vec<PathBuf> = WalkDir::new(web_root)
        .skip_hidden(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.file_name() == "index.html")
        .map(|e| e.path())
        .filter(|path| is_route_dir(path, web_root))
        .collect();
    snapshots.sort();
    snapshots
}

fn is_route_dir(snapshot: &Path, web_root: &Path) -> bool {
    let Some(dir) = snapshot.parent().and_then(|p| p.strip_prefix(web_root).ok()) else {
        return false;
    };
    dir.components().all(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| !name.starts_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::PrerenderArgs;
    use crate::config::test_parse_config;
    use crate::manifest::integrity::integrity;
    use crate::template::PRERENDER_BEGIN;
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;
    use tiny_http::{Response, Server};

    const SHELL: &str = "<html><body><div id=\"app\">Loading...</div></body></html>";
    const MANIFEST: &str = "self.assetsManifest = {\n  \"version\": \"abc\",\n  \"assets\": []\n};\n";

    /// Serves every route by rendering it into the saved halves.
    struct RenderingHost {
        server: Arc<Server>,
        port: u16,
        handle: Option<thread::JoinHandle<()>>,
    }

    impl RenderingHost {
        fn start(halves: TemplateHalves) -> Self {
            let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
            let port = server.server_addr().to_ip().unwrap().port();
            let handle = {
                let server = Arc::clone(&server);
                thread::spawn(move || {
                    for request in server.incoming_requests() {
                        let markup = match request.url() {
                            "/" => "<a href=\"/about\">About</a>".to_string(),
                            other => format!("<h1>{other}</h1><a href=\"/\">Home</a>"),
                        };
                        let _ = request.respond(Response::from_string(halves.render(&markup)));
                    }
                })
            };
            Self {
                server,
                port,
                handle: Some(handle),
            }
        }
    }

    impl Drop for RenderingHost {
        fn drop(&mut self) {
            self.server.unblock();
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn site(extra: &str) -> (TempDir, PrerenderConfig) {
        let dir = TempDir::new().unwrap();
        let web_root = dir.path().join("wwwroot");
        fs::create_dir_all(&web_root).unwrap();
        fs::write(web_root.join("index.html"), SHELL).unwrap();
        fs::write(web_root.join("service-worker-assets.js"), MANIFEST).unwrap();

        let mut config = test_parse_config(extra);
        config.finalize(dir.path(), &PrerenderArgs::default());
        (dir, config)
    }

    #[test]
    fn test_split_then_crawl() {
        let (_dir, mut config) = site("");
        let halves = split_template(&config).unwrap();
        assert_eq!(TemplateHalves::load(&config.build.halves).unwrap(), halves);

        let host = RenderingHost::start(halves.clone());
        config.crawl.base_url = format!("http://127.0.0.1:{}", host.port);

        let written = crawl_site(&config).unwrap();
        let web_root = &config.build.web_root;
        assert_eq!(
            written,
            vec![web_root.join("index.html"), web_root.join("about/index.html")]
        );

        let home = fs::read_to_string(web_root.join("index.html")).unwrap();
        assert!(home.contains(PRERENDER_BEGIN));

        let manifest = fs::read_to_string(web_root.join("service-worker-assets.js")).unwrap();
        let about = fs::read(web_root.join("about/index.html")).unwrap();
        assert!(manifest.contains(&integrity(&about)));

        let json = manifest
            .trim_end()
            .strip_prefix("self.assetsManifest = ")
            .and_then(|rest| rest.strip_suffix(';'))
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(json).unwrap();
        let urls: Vec<_> = parsed["assets"]
            .as_array()
            .unwrap()
            .iter()
            .map(|asset| asset["url"].as_str().unwrap())
            .collect();
        assert_eq!(urls.len(), 2);
        assert!(urls.contains(&"index.html"));
        assert!(urls.contains(&"about/index.html"));

        // The rendered shell splits back into the same halves
        assert_eq!(split_template(&config).unwrap(), halves);
    }

    #[test]
    fn test_rehash_existing_snapshots() {
        let (_dir, config) = site("");
        let web_root = &config.build.web_root;
        fs::create_dir_all(web_root.join("docs/intro")).unwrap();
        fs::create_dir_all(web_root.join(".cache")).unwrap();
        fs::write(web_root.join("docs/intro/index.html"), "<p>intro</p>").unwrap();
        fs::write(web_root.join(".cache/index.html"), "ignored").unwrap();

        assert_eq!(
            collect_snapshots(web_root),
            vec![web_root.join("docs/intro/index.html"), web_root.join("index.html")]
        );

        rehash(&config).unwrap();
        let manifest = fs::read_to_string(web_root.join("service-worker-assets.js")).unwrap();
        assert!(manifest.starts_with("self.assetsManifest = {"));
        assert!(manifest.contains("\"url\": \"docs/intro/index.html\""));
        assert!(manifest.contains("\"url\": \"index.html\""));
        assert!(!manifest.contains(".cache"));
        assert!(manifest.contains(&integrity(SHELL.as_bytes())));
    }

    #[test]
    fn test_rehash_without_manifest() {
        let (_dir, config) = site("[manifest]\npath = \"\"");
        rehash(&config).unwrap();
        let manifest =
            fs::read_to_string(config.build.web_root.join("service-worker-assets.js")).unwrap();
        assert_eq!(manifest, MANIFEST);
    }

    #[test]
    fn test_split_reports_missing_mount() {
        let (_dir, config) = site("[template]\nselector = \"#root\"");
        assert!(split_template(&config).is_err());
        assert!(!config.build.halves.exists());
    }
}
