//! Route type for crawl identity and output path derivation.
//!
//! Invariants:
//! - Always starts with `/`
//! - No trailing slash, except the root route `/` itself
//! - No empty segments (`/a//b` is stored as `/a/b`)
//! - Percent-encoding is kept as canonicalized by the `url` crate
//! - Case-sensitive: `/About` and `/about` are different routes

use std::borrow::Borrow;
use std::path::PathBuf;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use url::Url;

/// Normalized same-origin URL path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Route(Arc<str>);

impl Route {
    /// The root route `/`.
    pub fn root() -> Self {
        Self(Arc::from("/"))
    }

    /// Create from a parsed URL. Query string and fragment are dropped.
    pub fn from_url(url: &Url) -> Self {
        Self::from_segments(url.path())
    }

    /// Create from a raw path such as `/about/` or `docs//intro?x=1`.
    ///
    /// Uses the `url` crate to resolve dot segments and canonicalize
    /// percent-encoding, so `from_path` and `from_url` agree.
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim();
        let with_leading = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };

        match Url::parse("http://localhost/").and_then(|base| base.join(&with_leading)) {
            Ok(parsed) => Self::from_url(&parsed),
            // Fallback to simple split if url parsing fails
            Err(_) => Self::from_segments(
                with_leading
                    .split(['?', '#'])
                    .next()
                    .unwrap_or(&with_leading),
            ),
        }
    }

    fn from_segments(path: &str) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Self::root();
        }
        Self(Arc::from(format!("/{}", segments.join("/"))))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub fn is_root(&self) -> bool {
        self.0.as_ref() == "/"
    }

    /// Raw (still percent-encoded) path segments. Empty for the root route.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Whether the last segment looks like a file name (`report.pdf`).
    ///
    /// Such links point at assets, not at pages of the application.
    pub fn has_file_extension(&self) -> bool {
        self.segments().last().is_some_and(|last| {
            let decoded = decode_segment(last).unwrap_or_else(|| last.to_string());
            match decoded.rfind('.') {
                Some(pos) => pos > 0 && pos + 1 < decoded.len(),
                None => false,
            }
        })
    }

    /// Snapshot file path relative to the output root.
    ///
    /// `/` -> `index.html`, `/blog/post` -> `blog/post/index.html`.
    ///
    /// Returns `None` when a decoded segment cannot be a single path
    /// component (`..`, contains a separator or NUL, or is not UTF-8).
    pub fn output_relative(&self) -> Option<PathBuf> {
        let mut path = PathBuf::new();
        for segment in self.segments() {
            let decoded = decode_segment(segment)?;
            if !is_safe_component(&decoded) {
                return None;
            }
            path.push(decoded);
        }
        path.push("index.html");
        Some(path)
    }
}

fn decode_segment(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

fn is_safe_component(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::root()
    }
}

impl AsRef<str> for Route {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Route {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Route {
    fn from(s: &str) -> Self {
        Self::from_path(s)
    }
}

impl PartialEq<&str> for Route {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_root_normalization() {
        assert_eq!(Route::from_path("/"), "/");
        assert_eq!(Route::from_path(""), "/");
        assert_eq!(Route::from_path("//"), "/");
        assert_eq!(Route::from_path("/?q=1#top"), "/");
        assert!(Route::from_path("/").is_root());
    }

    #[test]
    fn test_trailing_slash_and_empty_segments() {
        assert_eq!(Route::from_path("/about/"), "/about");
        assert_eq!(Route::from_path("about"), "/about");
        assert_eq!(Route::from_path("/docs//intro/"), "/docs/intro");
        assert_eq!(Route::from_path("/about/"), Route::from_path("/about"));
    }

    #[test]
    fn test_query_fragment_and_dot_segments() {
        assert_eq!(Route::from_path("/about?tab=1"), "/about");
        assert_eq!(Route::from_path("/about#team"), "/about");
        assert_eq!(Route::from_path("/docs/../about"), "/about");
        assert_eq!(Route::from_path("/./about"), "/about");
    }

    #[test]
    fn test_case_sensitive() {
        assert_ne!(Route::from_path("/About"), Route::from_path("/about"));
    }

    #[test]
    fn test_from_url() {
        let url = Url::parse("http://127.0.0.1:5050/counter/?x=1#y").unwrap();
        assert_eq!(Route::from_url(&url), "/counter");
    }

    #[test]
    fn test_output_relative() {
        assert_eq!(
            Route::root().output_relative().unwrap(),
            Path::new("index.html")
        );
        assert_eq!(
            Route::from_path("/about").output_relative().unwrap(),
            Path::new("about").join("index.html")
        );
        assert_eq!(
            Route::from_path("/blog/post").output_relative().unwrap(),
            Path::new("blog").join("post").join("index.html")
        );
    }

    #[test]
    fn test_output_relative_decodes_segments() {
        assert_eq!(
            Route::from_path("/caf%C3%A9").output_relative().unwrap(),
            Path::new("café").join("index.html")
        );
        assert_eq!(
            Route::from_path("/hello world").output_relative().unwrap(),
            Path::new("hello world").join("index.html")
        );
    }

    #[test]
    fn test_output_relative_rejects_unsafe_segments() {
        assert!(Route::from_path("/a%2Fb").output_relative().is_none());
        assert!(Route::from_path("/a%5Cb").output_relative().is_none());
        assert!(Route::from_path("/a%00b").output_relative().is_none());
    }

    #[test]
    fn test_has_file_extension() {
        assert!(Route::from_path("/report.pdf").has_file_extension());
        assert!(Route::from_path("/docs/index.html").has_file_extension());
        assert!(!Route::from_path("/about").has_file_extension());
        assert!(!Route::from_path("/.well-known").has_file_extension());
        assert!(!Route::root().has_file_extension());
    }
}
