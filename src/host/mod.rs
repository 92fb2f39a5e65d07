//! Rendering host supervision.
//!
//! The rendering host is an external program. It receives everything it
//! needs through environment variables and must answer HTTP on the base URL:
//!
//! | Variable               | Value                                        |
//! |------------------------|----------------------------------------------|
//! | `PRERENDER_TEMPLATE`   | template halves JSON (`{ first, second }`)   |
//! | `PRERENDER_WEB_ROOT`   | web root with the application's static files |
//! | `PRERENDER_URL`        | base URL to listen on                        |
//! | `PRERENDER_MIDDLEWARE` | `id,assembly,version` entries joined by `;`  |

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use url::Url;

use crate::{debug, log};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host command is empty")]
    EmptyCommand,

    #[error("failed to launch rendering host `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rendering host exited before it became ready ({0})")]
    Exited(String),

    #[error("rendering host did not answer on {url} within {}s", .timeout.as_secs())]
    NotReady { url: Url, timeout: Duration },

    #[error("failed to stop rendering host")]
    Stop(#[source] std::io::Error),
}

/// How to launch the rendering host.
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Program and arguments.
    pub command: Vec<String>,
    /// Working directory of the child.
    pub cwd: PathBuf,
    pub template: PathBuf,
    pub web_root: PathBuf,
    pub base_url: Url,
    /// `Package.Id[,Assembly[,Version]]` entries.
    pub middleware: Vec<String>,
    pub ready_timeout: Duration,
    /// Leave the host running after the pipeline and wait for it to exit.
    pub keep_running: bool,
}

impl HostOptions {
    fn envs(&self) -> [(&'static str, String); 4] {
        [
            ("PRERENDER_TEMPLATE", self.template.display().to_string()),
            ("PRERENDER_WEB_ROOT", self.web_root.display().to_string()),
            ("PRERENDER_URL", self.base_url.to_string()),
            ("PRERENDER_MIDDLEWARE", self.middleware.join(";")),
        ]
    }
}

/// A launched rendering host. Killed on drop unless handed off via
/// [`HostProcess::finish`].
pub struct HostProcess {
    child: Option<Child>,
    keep_running: bool,
}

impl HostProcess {
    /// Launch the host and block until it answers on the base URL.
    pub fn launch(options: &HostOptions) -> Result<Self, HostError> {
        let (program, args) = options
            .command
            .split_first()
            .ok_or(HostError::EmptyCommand)?;

        log!("host"; "starting `{}`", options.command.join(" "));
        let child = Command::new(program)
            .args(args)
            .current_dir(&options.cwd)
            .envs(options.envs())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| HostError::Spawn {
                program: program.clone(),
                source,
            })?;

        let mut host = Self {
            child: Some(child),
            keep_running: options.keep_running,
        };
        host.wait_ready(&options.base_url, options.ready_timeout)?;
        log!("host"; "ready on {}", options.base_url);
        Ok(host)
    }

    /// Poll `GET url` until any HTTP response arrives.
    fn wait_ready(&mut self, url: &Url, timeout: Duration) -> Result<(), HostError> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(REQUEST_TIMEOUT)
            .timeout_read(REQUEST_TIMEOUT)
            .redirects(0)
            .build();
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(child) = self.child.as_mut()
                && let Ok(Some(status)) = child.try_wait()
            {
                self.child = None;
                return Err(HostError::Exited(status.to_string()));
            }

            match agent.get(url.as_str()).call() {
                // Any status means the host is serving
                Ok(_) | Err(ureq::Error::Status(..)) => return Ok(()),
                Err(ureq::Error::Transport(err)) => {
                    debug!("host"; "not ready yet: {err}");
                }
            }

            if Instant::now() >= deadline {
                return Err(HostError::NotReady {
                    url: url.clone(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Stop the host, or wait for it to exit when `keep_running` is set.
    pub fn finish(mut self) -> Result<(), HostError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if self.keep_running {
            log!("host"; "keeping rendering host running, press Ctrl+C to stop");
            child.wait().map_err(HostError::Stop)?;
            return Ok(());
        }

        stop(&mut child)
    }
}

impl Drop for HostProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = stop(&mut child);
        }
    }
}

fn stop(child: &mut Child) -> Result<(), HostError> {
    if let Ok(Some(_)) = child.try_wait() {
        return Ok(());
    }
    debug!("host"; "stopping rendering host (pid {})", child.id());
    child.kill().map_err(HostError::Stop)?;
    child.wait().map_err(HostError::Stop)?;
    Ok(())
}
