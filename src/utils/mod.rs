//! Utility modules shared by the pipeline stages.

pub mod atomic;
pub mod html;
pub mod path;
mod plural;

pub use atomic::atomic_write;
pub use plural::plural_count;
