//! Configuration utility types.
//!
//! | Module  | Purpose                                 |
//! |---------|-----------------------------------------|
//! | `error` | `ConfigError` and validation diagnostics |
//! | `field` | Dotted field paths for diagnostics      |

mod error;
mod field;

pub use error::{ConfigDiagnostics, ConfigError};
pub use field::FieldPath;
