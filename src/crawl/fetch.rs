//! Route fetching against the rendering host.

use std::io::Read;
use std::thread;
use std::time::Duration;

use url::Url;

use super::CrawlError;
use crate::core::Route;
use crate::debug;

/// Pause between attempts, multiplied by the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Same-origin redirect hops followed per attempt.
const MAX_REDIRECTS: usize = 5;

/// Blocking HTTP client shared by all crawl workers.
pub(super) struct Fetcher {
    agent: ureq::Agent,
    retries: u32,
}

/// Why a single attempt failed.
enum Attempt {
    /// Worth trying again (transport error, 5xx, truncated body).
    Transient(String),
    /// Retrying cannot help.
    Fatal(CrawlError),
}

impl Fetcher {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .redirects(0)
            .build();
        Self { agent, retries }
    }

    /// `GET url` and return the complete body.
    ///
    /// Only a 2xx response counts as success. Redirects are followed while
    /// they stay on the same origin; leaving it is fatal. Transport errors
    /// and 5xx are retried up to `retries` times; everything else fails
    /// immediately.
    pub fn get(&self, route: &Route, url: &Url) -> Result<Vec<u8>, CrawlError> {
        let mut attempt = 0;
        loop {
            match self.attempt(route, url) {
                Ok(body) => return Ok(body),
                Err(Attempt::Fatal(err)) => return Err(err),
                Err(Attempt::Transient(message)) if attempt < self.retries => {
                    attempt += 1;
                    debug!("crawl"; "{route}: {message}, retry {attempt}/{}", self.retries);
                    thread::sleep(RETRY_BACKOFF * attempt);
                }
                Err(Attempt::Transient(message)) => {
                    return Err(CrawlError::Fetch {
                        route: route.clone(),
                        message,
                    });
                }
            }
        }
    }

    fn attempt(&self, route: &Route, url: &Url) -> Result<Vec<u8>, Attempt> {
        let mut current = url.clone();
        let mut hops = 0;

        let response = loop {
            let response = match self.agent.get(current.as_str()).call() {
                Ok(response) => response,
                Err(ureq::Error::Status(code, _)) if code >= 500 => {
                    return Err(Attempt::Transient(format!("server returned status {code}")));
                }
                Err(ureq::Error::Status(code, _)) => {
                    return Err(Attempt::Fatal(CrawlError::Status {
                        route: route.clone(),
                        code,
                    }));
                }
                Err(ureq::Error::Transport(transport)) => {
                    return Err(Attempt::Transient(format!("transport error: {transport}")));
                }
            };

            let code = response.status();
            if !(300..400).contains(&code) {
                break response;
            }

            // Only redirects that stay on the rendering host are followed
            let Some(next) = response
                .header("location")
                .and_then(|location| current.join(location).ok())
            else {
                return Err(Attempt::Fatal(CrawlError::Status {
                    route: route.clone(),
                    code,
                }));
            };
            if next.origin() != url.origin() {
                return Err(Attempt::Fatal(CrawlError::CrossOriginRedirect {
                    route: route.clone(),
                    location: next.to_string(),
                }));
            }
            hops += 1;
            if hops > MAX_REDIRECTS {
                return Err(Attempt::Fatal(CrawlError::Fetch {
                    route: route.clone(),
                    message: format!("more than {MAX_REDIRECTS} redirects"),
                }));
            }
            debug!("crawl"; "{route}: {code} redirect to {next}");
            current = next;
        };

        // Anything else outside 2xx leaves no body to store
        let code = response.status();
        if !(200..300).contains(&code) {
            return Err(Attempt::Fatal(CrawlError::Status {
                route: route.clone(),
                code,
            }));
        }

        let mut body = Vec::new();
        match response.into_reader().read_to_end(&mut body) {
            Ok(_) => Ok(body),
            Err(err) => Err(Attempt::Transient(format!("failed to read body: {err}"))),
        }
    }
}
