//! Configuration section definitions.
//!
//! Each module corresponds to a section in `prerender.toml`:
//!
//! | Module     | TOML Section   | Purpose                              |
//! |------------|----------------|--------------------------------------|
//! | `build`    | `[build]`      | Web root and template halves paths   |
//! | `template` | `[template]`   | Mount element selection              |
//! | `crawl`    | `[crawl]`      | Rendering host URL, fetch policy     |
//! | `manifest` | `[manifest]`   | Service worker asset manifest        |
//! | `host`     | `[host]`       | Launching the rendering host         |

mod build;
mod crawl;
mod host;
mod manifest;
mod template;

pub use build::BuildConfig;
pub use crawl::CrawlConfig;
pub use host::HostConfig;
pub use manifest::ManifestConfig;
pub use template::TemplateConfig;
