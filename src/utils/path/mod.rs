//! Path utilities.
//!
//! Pure functions for path manipulation. No side effects.
//!
//! - [`fs`]: Filesystem path normalization (`normalize_path`, `resolve_against`)
//! - [`relative`]: Output-root relative URLs (`relative_url`)

pub mod fs;
pub mod relative;

pub use fs::{normalize_path, resolve_against};
pub use relative::relative_url;
