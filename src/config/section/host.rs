//! `[host]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [host]
//! command = ["dotnet", "run", "--project", "Server"]
//! middleware = ["Toolbelt.Blazor.HeadElement.ServerPrerendering,,1.0.0"]
//! ready_timeout = 60     # Seconds to wait for the host to answer
//! keep_running = false   # Leave the host up after the build
//! ```
//!
//! With an empty `command` the host is expected to be running already.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Program and arguments that start the rendering host.
    pub command: Vec<String>,

    /// `Package.Id[,Assembly[,Version]]` middleware entries.
    pub middleware: Vec<String>,

    pub ready_timeout: u64,

    pub keep_running: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            middleware: Vec::new(),
            ready_timeout: 60,
            keep_running: false,
        }
    }
}

impl HostConfig {
    pub const COMMAND: FieldPath = FieldPath::new("host.command");
    pub const MIDDLEWARE: FieldPath = FieldPath::new("host.middleware");
    pub const READY_TIMEOUT: FieldPath = FieldPath::new("host.ready_timeout");

    pub fn is_managed(&self) -> bool {
        !self.command.is_empty()
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.command.first().is_some_and(|program| program.trim().is_empty()) {
            diag.error(Self::COMMAND, "program name must not be empty");
        }
        if self.ready_timeout == 0 {
            diag.error(Self::READY_TIMEOUT, "must be at least 1 second");
        }
        for entry in &self.middleware {
            let parts: Vec<&str> = entry.split(',').map(str::trim).collect();
            if parts[0].is_empty() || parts.len() > 3 {
                diag.error_with_hint(
                    Self::MIDDLEWARE,
                    format!("invalid entry `{entry}`"),
                    "expected `Package.Id[,Assembly[,Version]]`",
                );
            }
        }
    }
}
