//! Navigable link extraction from fetched pages.

use url::Url;

use crate::core::Route;
use crate::utils::html::unescape;

/// A link-bearing tag found in the page, in document order.
struct LinkTag {
    offset: usize,
    name: String,
    href: Option<String>,
    download: bool,
}

/// Extract the same-origin routes linked from `body`.
///
/// Targets come from `<a href>` and `<area href>`. Hrefs are resolved
/// against the document's `<base href>` when present (itself resolved
/// against `page_url`), otherwise against `base_url`. Returned routes are
/// in document order with duplicates removed; the caller decides which of
/// them are new.
///
/// Dropped silently:
/// - cross-origin targets and non-http(s) schemes (`mailto:`, `javascript:`)
/// - anchors carrying a `download` attribute
/// - targets whose last segment has a file extension (assets)
pub(super) fn extract_routes(body: &str, page_url: &Url, base_url: &Url) -> Vec<Route> {
    let tags = collect_tags(body);

    let document_base = tags
        .iter()
        .filter(|tag| tag.name == "base")
        .find_map(|tag| tag.href.as_deref())
        .and_then(|href| page_url.join(href.trim()).ok());
    let resolve_base = document_base.as_ref().unwrap_or(base_url);

    let mut routes: Vec<Route> = Vec::new();
    for tag in &tags {
        if tag.name == "base" || tag.download {
            continue;
        }
        let Some(href) = tag.href.as_deref() else {
            continue;
        };
        let Some(route) = navigable_route(href, resolve_base, base_url) else {
            continue;
        };
        if !routes.contains(&route) {
            routes.push(route);
        }
    }
    routes
}

/// Resolve one href to a route on `origin`'s origin, if it is a page link.
fn navigable_route(href: &str, resolve_base: &Url, origin: &Url) -> Option<Route> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let target = resolve_base.join(href).ok()?;
    if !matches!(target.scheme(), "http" | "https") || target.origin() != origin.origin() {
        return None;
    }

    let route = Route::from_url(&target);
    (!route.has_file_extension()).then_some(route)
}

fn collect_tags(body: &str) -> Vec<LinkTag> {
    let Ok(dom) = tl::parse(body, tl::ParserOptions::default()) else {
        return Vec::new();
    };
    let base_ptr = body.as_ptr() as usize;

    let mut tags: Vec<LinkTag> = dom
        .nodes()
        .iter()
        .filter_map(tl::Node::as_tag)
        .filter_map(|tag| {
            let name = tag.name().as_utf8_str().to_ascii_lowercase();
            if !matches!(name.as_str(), "a" | "area" | "base") {
                return None;
            }

            let mut href = None;
            let mut download = false;
            for (key, value) in tag.attributes().iter() {
                let key: &str = key.as_ref();
                if key.eq_ignore_ascii_case("href") && href.is_none() {
                    href = value.map(|v| unescape(&v).into_owned());
                } else if key.eq_ignore_ascii_case("download") {
                    download = true;
                }
            }

            let offset = (tag.raw().as_bytes().as_ptr() as usize).saturating_sub(base_ptr);
            Some(LinkTag {
                offset,
                name,
                href,
                download,
            })
        })
        .collect();

    // Arena order is not guaranteed to be document order
    tags.sort_by_key(|tag| tag.offset);
    tags
}
