//! Crawl tests against an in-process fake rendering host.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tempfile::TempDir;
use tiny_http::{Header, Response, Server};

use super::*;

// ============================================================================
// Fake host
// ============================================================================

#[derive(Clone)]
struct Page {
    status: u16,
    body: String,
    /// Answer 503 this many times before serving the page.
    fail_first: usize,
    /// Sent as the `Location` header.
    location: Option<String>,
}

fn page(body: &str) -> Page {
    Page {
        status: 200,
        body: body.to_string(),
        fail_first: 0,
        location: None,
    }
}

fn redirect(location: &str) -> Page {
    Page {
        status: 302,
        location: Some(location.to_string()),
        ..page("")
    }
}

struct FakeHost {
    url: Url,
    hits: Arc<Mutex<FxHashMap<String, usize>>>,
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
}

impl FakeHost {
    fn start(pages: &[(&str, Page)]) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();
        let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();

        let pages: FxHashMap<String, Page> = pages
            .iter()
            .map(|(path, page)| (path.to_string(), page.clone()))
            .collect();
        let hits = Arc::new(Mutex::new(FxHashMap::default()));

        let handle = {
            let server = Arc::clone(&server);
            let hits = Arc::clone(&hits);
            thread::spawn(move || {
                for request in server.incoming_requests() {
                    let path = request.url().split('?').next().unwrap_or("/").to_string();
                    let count = {
                        let mut hits = hits.lock();
                        let count = hits.entry(path.clone()).or_insert(0);
                        *count += 1;
                        *count
                    };

                    let response = match pages.get(&path) {
                        Some(page) if count <= page.fail_first => {
                            Response::from_string("unavailable").with_status_code(503)
                        }
                        Some(page) => {
                            let mut response = Response::from_string(page.body.clone())
                                .with_status_code(page.status)
                                .with_header(
                                    Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..])
                                        .unwrap(),
                                );
                            if let Some(location) = &page.location {
                                response = response.with_header(
                                    Header::from_bytes(&b"Location"[..], location.as_bytes())
                                        .unwrap(),
                                );
                            }
                            response
                        }
                        None => Response::from_string("not found").with_status_code(404),
                    };
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            url,
            hits,
            server,
            handle: Some(handle),
        }
    }

    fn hits(&self, path: &str) -> usize {
        self.hits.lock().get(path).copied().unwrap_or(0)
    }

    fn total_hits(&self) -> usize {
        self.hits.lock().values().sum()
    }
}

impl Drop for FakeHost {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn options(host: &FakeHost, root: &Path) -> CrawlOptions {
    let mut options = CrawlOptions::new(host.url.clone(), root);
    options.timeout = Duration::from_secs(5);
    options
}

fn relative(root: &Path, paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            p.strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

fn html(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{href}">{href}</a>"#))
        .collect();
    format!("<!DOCTYPE html><html><body><div id=\"app\">{anchors}</div></body></html>")
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn test_two_page_site() {
    let host = FakeHost::start(&[("/", page(&html(&["/about"]))), ("/about", page(&html(&["/"])))]);
    let dir = TempDir::new().unwrap();

    let written = crawl(&options(&host, dir.path())).unwrap();

    assert_eq!(relative(dir.path(), &written), vec!["index.html", "about/index.html"]);
    assert_eq!(
        fs::read_to_string(dir.path().join("index.html")).unwrap(),
        html(&["/about"])
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("about/index.html")).unwrap(),
        html(&["/"])
    );
    assert_eq!(host.hits("/"), 1);
    assert_eq!(host.hits("/about"), 1);
}

#[test]
fn test_equivalent_links_fetched_once() {
    let host = FakeHost::start(&[
        (
            "/",
            page(&html(&[
                "/about",
                "/about/",
                "about",
                "./about?tab=1",
                "/about#team",
                "http://127.0.0.1:1/elsewhere",
                "mailto:team@example.com",
                "#top",
                "/",
            ])),
        ),
        ("/about", page(&html(&["/", "/about"]))),
    ]);
    let dir = TempDir::new().unwrap();

    let written = crawl(&options(&host, dir.path())).unwrap();

    assert_eq!(written.len(), 2);
    assert_eq!(host.hits("/"), 1);
    assert_eq!(host.hits("/about"), 1);
    assert_eq!(host.total_hits(), 2);
}

#[test]
fn test_breadth_first_order() {
    let host = FakeHost::start(&[
        ("/", page(&html(&["/a", "/b"]))),
        ("/a", page(&html(&["/a/deep"]))),
        ("/b", page(&html(&["/c"]))),
        ("/a/deep", page(&html(&[]))),
        ("/c", page(&html(&[]))),
    ]);
    let dir = TempDir::new().unwrap();

    let written = crawl(&options(&host, dir.path())).unwrap();
    assert_eq!(
        relative(dir.path(), &written),
        vec![
            "index.html",
            "a/index.html",
            "b/index.html",
            "a/deep/index.html",
            "c/index.html"
        ]
    );
}

#[test]
fn test_concurrency_keeps_discovery_order() {
    let mut pages = vec![(
        "/".to_string(),
        page(&html(&["/p0", "/p1", "/p2", "/p3", "/p4", "/p5", "/p6", "/p7"])),
    )];
    for i in 0..8 {
        let child = format!("/p{i}/child");
        pages.push((format!("/p{i}"), page(&html(&["/", child.as_str()]))));
        pages.push((child, page(&html(&[]))));
    }
    let pages: Vec<(&str, Page)> = pages.iter().map(|(p, page)| (p.as_str(), page.clone())).collect();

    let host = FakeHost::start(&pages);
    let serial_dir = TempDir::new().unwrap();
    let parallel_dir = TempDir::new().unwrap();

    let serial = crawl(&options(&host, serial_dir.path())).unwrap();

    let mut parallel_options = options(&host, parallel_dir.path());
    parallel_options.concurrency = 4;
    let parallel = crawl(&parallel_options).unwrap();

    assert_eq!(serial.len(), 17);
    assert_eq!(
        relative(serial_dir.path(), &serial),
        relative(parallel_dir.path(), &parallel)
    );
}

#[test]
fn test_rerun_replaces_snapshots() {
    let host = FakeHost::start(&[("/", page("<p>short</p>"))]);
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("index.html"),
        "a previous snapshot that was much longer",
    )
    .unwrap();

    crawl(&options(&host, dir.path())).unwrap();
    assert_eq!(
        fs::read_to_string(dir.path().join("index.html")).unwrap(),
        "<p>short</p>"
    );
}

// ============================================================================
// Compressed variants
// ============================================================================

#[test]
fn test_gzip_and_brotli_variants() {
    let host = FakeHost::start(&[("/", page(&html(&["/about"]))), ("/about", page(&html(&[])))]);
    let dir = TempDir::new().unwrap();

    let mut options = options(&host, dir.path());
    options.variants = Variants {
        gzip: true,
        brotli: true,
    };
    let written = crawl(&options).unwrap();

    // Variants are not part of the returned list
    assert_eq!(written.len(), 2);

    for path in &written {
        let snapshot = fs::read(path).unwrap();

        let mut gunzipped = Vec::new();
        let gz = fs::read(format!("{}.gz", path.display())).unwrap();
        flate2::read::GzDecoder::new(&gz[..])
            .read_to_end(&mut gunzipped)
            .unwrap();
        assert_eq!(gunzipped, snapshot);

        let mut unbrotlied = Vec::new();
        let br = fs::read(format!("{}.br", path.display())).unwrap();
        brotli::Decompressor::new(&br[..], 4096)
            .read_to_end(&mut unbrotlied)
            .unwrap();
        assert_eq!(unbrotlied, snapshot);
    }
}

#[test]
fn test_detect_variants() {
    let dir = TempDir::new().unwrap();
    assert_eq!(detect_variants(dir.path()), Variants::default());

    fs::write(dir.path().join("index.html.gz"), b"").unwrap();
    assert_eq!(
        detect_variants(dir.path()),
        Variants {
            gzip: true,
            brotli: false
        }
    );

    fs::write(dir.path().join("index.html.br"), b"").unwrap();
    assert_eq!(
        detect_variants(dir.path()),
        Variants {
            gzip: true,
            brotli: true
        }
    );
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_missing_route_fails_run() {
    let host = FakeHost::start(&[("/", page(&html(&["/missing"])))]);
    let dir = TempDir::new().unwrap();

    let err = crawl(&options(&host, dir.path())).unwrap_err();
    match err {
        CrawlError::Status { route, code } => {
            assert_eq!(route, "/missing");
            assert_eq!(code, 404);
        }
        other => panic!("unexpected error: {other}"),
    }
    // 4xx is not retried
    assert_eq!(host.hits("/missing"), 1);
}

#[test]
fn test_server_error_fails_without_retries() {
    let flaky = Page {
        fail_first: 1,
        ..page("<p>ok</p>")
    };
    let host = FakeHost::start(&[("/", flaky)]);
    let dir = TempDir::new().unwrap();

    let err = crawl(&options(&host, dir.path())).unwrap_err();
    assert!(matches!(err, CrawlError::Fetch { ref route, .. } if route.is_root()));
    assert!(!dir.path().join("index.html").exists());
}

#[test]
fn test_server_error_recovers_with_retries() {
    let flaky = Page {
        fail_first: 2,
        ..page("<p>ok</p>")
    };
    let host = FakeHost::start(&[("/", flaky)]);
    let dir = TempDir::new().unwrap();

    let mut options = options(&host, dir.path());
    options.retries = 2;
    let written = crawl(&options).unwrap();

    assert_eq!(written.len(), 1);
    assert_eq!(host.hits("/"), 3);
}

#[test]
fn test_unreachable_host() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = TempDir::new().unwrap();
    let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();

    let mut options = CrawlOptions::new(url, dir.path());
    options.timeout = Duration::from_secs(2);
    let err = crawl(&options).unwrap_err();
    assert!(matches!(err, CrawlError::Fetch { .. }));
}

#[test]
fn test_structural_conflict_is_fatal() {
    let host = FakeHost::start(&[
        ("/", page(&html(&["/index.html/foo"]))),
        ("/index.html/foo", page(&html(&[]))),
    ]);
    let dir = TempDir::new().unwrap();

    let err = crawl(&options(&host, dir.path())).unwrap_err();
    assert!(matches!(err, CrawlError::DirectoryConflict { .. }));
    // Detected before the conflicting route is fetched
    assert_eq!(host.hits("/index.html/foo"), 0);
}

#[test]
fn test_existing_file_blocks_route_directory() {
    let host = FakeHost::start(&[("/", page(&html(&["/about"]))), ("/about", page(&html(&[])))]);
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("about"), "stray file").unwrap();

    let err = crawl(&options(&host, dir.path())).unwrap_err();
    assert!(matches!(err, CrawlError::OnDisk { ref route, .. } if *route == "/about"));
}

#[test]
fn test_invalid_base_url() {
    let dir = TempDir::new().unwrap();
    let options = CrawlOptions::new(Url::parse("file:///srv/site").unwrap(), dir.path());
    assert!(matches!(
        crawl(&options),
        Err(CrawlError::InvalidBaseUrl(_))
    ));
}

// ============================================================================
// Redirects
// ============================================================================

#[test]
fn test_same_origin_redirect_followed() {
    let host = FakeHost::start(&[
        ("/", page(&html(&["/old"]))),
        ("/old", redirect("/new-home")),
        ("/new-home", page("<p>moved</p>")),
    ]);
    let dir = TempDir::new().unwrap();

    let written = crawl(&options(&host, dir.path())).unwrap();
    assert_eq!(relative(dir.path(), &written), vec!["index.html", "old/index.html"]);
    assert_eq!(
        fs::read_to_string(dir.path().join("old/index.html")).unwrap(),
        "<p>moved</p>"
    );
}

#[test]
fn test_cross_origin_redirect_is_fatal() {
    let foreign = FakeHost::start(&[("/evil", page("<p>foreign</p>"))]);
    let target = foreign.url.join("/evil").unwrap();
    let host = FakeHost::start(&[
        ("/", page(&html(&["/login"]))),
        ("/login", redirect(target.as_str())),
    ]);
    let dir = TempDir::new().unwrap();

    let err = crawl(&options(&host, dir.path())).unwrap_err();
    assert!(
        matches!(err, CrawlError::CrossOriginRedirect { ref route, .. } if *route == "/login"),
        "{err}"
    );
    assert_eq!(foreign.total_hits(), 0);
    assert!(!dir.path().join("login/index.html").exists());
}

#[test]
fn test_redirect_without_location() {
    let host = FakeHost::start(&[(
        "/",
        Page {
            status: 301,
            ..page("")
        },
    )]);
    let dir = TempDir::new().unwrap();

    let err = crawl(&options(&host, dir.path())).unwrap_err();
    assert!(matches!(err, CrawlError::Status { code: 301, .. }));
}

#[test]
fn test_redirect_loop() {
    let host = FakeHost::start(&[("/", redirect("/"))]);
    let dir = TempDir::new().unwrap();

    let err = crawl(&options(&host, dir.path())).unwrap_err();
    assert!(matches!(err, CrawlError::Fetch { .. }));
}
