//! Process-wide shutdown state.
//!
//! The crawl checks `is_shutdown()` between levels so Ctrl+C stops the run
//! before the manifest is touched.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Setup the global Ctrl+C handler. Call once at program start
///
/// The first Ctrl+C only sets the flag so in-flight writes can finish;
/// a second one exits immediately.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        crate::log!("crawl"; "shutting down after the current level...");
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Check if shutdown has been requested
///
/// Uses Relaxed ordering for performance - worst case is fetching
/// a few more routes before stopping, which is acceptable
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
