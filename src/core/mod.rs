//! Core types - pure abstractions shared across the codebase.

mod route;
mod state;

pub use route::Route;
pub use state::{is_shutdown, setup_shutdown_handler};
