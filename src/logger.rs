//! Logging utilities with colored output and progress display.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` macro gated by `--verbose`
//! - `ProgressLine` for single-line crawl progress with open-ended counters
//!
//! # Example
//!
//! ```ignore
//! log!("crawl"; "fetching {}", base_url);
//!
//! let progress = ProgressLine::new(&["fetched", "queued"]);
//! progress.set("queued", 3);
//! progress.inc("fetched");
//! progress.finish();
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Active progress line count (for log coordination)
static BAR_COUNT: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
#[allow(clippy::cast_possible_truncation)] // Safe: bars count is always small
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();

    let bar_count = BAR_COUNT.load(Ordering::SeqCst);
    if bar_count > 0 {
        execute!(
            stdout,
            cursor::MoveToColumn(0),
            Clear(ClearType::CurrentLine)
        )
        .ok();
    }

    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "crawl" => prefix.bright_blue().bold().to_string(),
        "manifest" => prefix.bright_green().bold().to_string(),
        "host" => prefix.bright_magenta().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Progress Line (single-line counters)
// ============================================================================

/// Single-line progress display with open-ended counters
///
/// Displays: `[crawl] fetched(42) queued(7)`
///
/// Unlike a build progress bar the crawl does not know its total up front,
/// so counters only show the current value. Uses `try_lock` to avoid
/// blocking worker threads - if display is busy, the update is skipped.
pub struct ProgressLine {
    counters: Vec<Counter>,
    lock: Mutex<()>,
    enabled: bool,
}

struct Counter {
    name: &'static str,
    current: AtomicUsize,
}

impl ProgressLine {
    /// Create a new progress display. Hidden when `enabled` is false.
    pub fn new(names: &[&'static str], enabled: bool) -> Self {
        let counters = names
            .iter()
            .map(|name| Counter {
                name,
                current: AtomicUsize::new(0),
            })
            .collect();

        if enabled {
            BAR_COUNT.store(1, Ordering::SeqCst);
        }

        let progress = Self {
            counters,
            lock: Mutex::new(()),
            enabled,
        };
        progress.display();
        progress
    }

    /// Increment the counter with the given name.
    #[inline]
    pub fn inc(&self, name: &str) {
        if let Some(counter) = self.counter(name) {
            counter.current.fetch_add(1, Ordering::Relaxed);
            self.refresh();
        }
    }

    /// Overwrite the counter with the given name.
    #[inline]
    pub fn set(&self, name: &str, value: usize) {
        if let Some(counter) = self.counter(name) {
            counter.current.store(value, Ordering::Relaxed);
            self.refresh();
        }
    }

    /// Current value of a counter (0 for unknown names).
    pub fn get(&self, name: &str) -> usize {
        self.counter(name)
            .map_or(0, |c| c.current.load(Ordering::Relaxed))
    }

    fn counter(&self, name: &str) -> Option<&Counter> {
        self.counters.iter().find(|c| c.name == name)
    }

    fn refresh(&self) {
        // Non-blocking: skip display if lock is held
        if self.lock.try_lock().is_some() {
            self.display();
        }
    }

    fn line(&self) -> String {
        self.counters
            .iter()
            .map(|c| format!("{}({})", c.name, c.current.load(Ordering::Relaxed)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Display the current progress line (overwrites current line).
    fn display(&self) {
        if !self.enabled {
            return;
        }
        let prefix = colorize_prefix("crawl", "crawl");

        let mut stdout = stdout().lock();
        execute!(
            stdout,
            cursor::MoveToColumn(0),
            Clear(ClearType::CurrentLine)
        )
        .ok();
        write!(stdout, "{} {}", prefix, self.line()).ok();
        stdout.flush().ok();
    }

    /// Finish progress display, preserve line and move to next line.
    pub fn finish(self) {
        BAR_COUNT.store(0, Ordering::SeqCst);

        if self.enabled {
            let _guard = self.lock.lock();
            let prefix = colorize_prefix("crawl", "crawl");

            let mut stdout = stdout().lock();
            execute!(
                stdout,
                cursor::MoveToColumn(0),
                Clear(ClearType::CurrentLine)
            )
            .ok();
            writeln!(stdout, "{} {}", prefix, self.line()).ok();
            stdout.flush().ok();
        }

        std::mem::forget(self); // Prevent Drop from clearing
    }
}

impl Drop for ProgressLine {
    fn drop(&mut self) {
        BAR_COUNT.store(0, Ordering::SeqCst);

        if !self.enabled {
            return;
        }
        // Clear the line on drop (if not finished properly)
        let mut stdout = stdout().lock();
        execute!(
            stdout,
            cursor::MoveToColumn(0),
            Clear(ClearType::CurrentLine)
        )
        .ok();
        stdout.flush().ok();
    }
}

// ============================================================================
// Tests
// ============================================================================
