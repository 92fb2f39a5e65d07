//! Mount element lookup.
//!
//! The shell is streamed through `lol_html` with one element handler per
//! selector of the group. The first matching element in document order gets
//! a sentinel comment right after its start tag and another right before its
//! end tag. `lol_html` emits every other byte of the input untouched, so the
//! comment positions translate directly into offsets in the original text.
//!
//! End tags follow HTML tokenization: `</div >` closes a `div`, and an end
//! tag implicitly closes open children such as an unterminated `<p>`.
//!
//! Supported selector grammar (per selector of a comma separated group):
//! `*`, `E`, `.class`, `#id`, `[attr]`, `[attr="v"]` with the `~= ^= $= *= |=`
//! operators and `i`/`s` flags, `:first-child`, `:nth-child(n)`,
//! `:first-of-type`, `:nth-of-type(n)`, `:not(s)`, and the descendant
//! (`E F`) and child (`E > F`) combinators. Anything else is rejected as an
//! invalid selector rather than silently matching nothing.

use std::borrow::Cow;
use std::cell::RefCell;

use lol_html::html_content::ContentType;
use lol_html::{ElementContentHandlers, RewriteStrSettings, Selector, rewrite_str};

use super::TemplateError;
use crate::utils::html::is_void_element;

const OPEN_SENTINEL: &str = "<!--%%-PRERENDER-MOUNT-OPEN-%%-->";
const CLOSE_SENTINEL: &str = "<!--%%-PRERENDER-MOUNT-CLOSE-%%-->";

/// Byte offsets of the mount element's content inside the shell text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct MountSpan {
    /// Just past the `>` that closes the start tag.
    pub open_end: usize,
    /// Position of the `</` that begins the end tag.
    pub close_start: usize,
}

/// What the handlers saw for the first matching element.
enum Found {
    Mount(String),
    Void(String),
}

/// Find the first element in document order matching `selector`.
///
/// Comma separated selector groups (`#app,app`) are evaluated together;
/// the earliest match across all groups wins, as with `querySelector`.
pub(super) fn find_mount(source: &str, selector: &str) -> Result<MountSpan, TemplateError> {
    let selectors = parse_selector_groups(selector)?;

    if source.contains(OPEN_SENTINEL) || source.contains(CLOSE_SENTINEL) {
        return Err(TemplateError::MarkerInShell);
    }

    let found: RefCell<Option<Found>> = RefCell::new(None);
    let handlers = selectors
        .into_iter()
        .map(|parsed| {
            let found = &found;
            let handler = ElementContentHandlers::default().element(move |el| {
                let mut found = found.borrow_mut();
                if found.is_some() {
                    return Ok(());
                }
                let name = el.tag_name().to_ascii_lowercase();
                if is_void_element(&name) {
                    *found = Some(Found::Void(name));
                    return Ok(());
                }
                el.prepend(OPEN_SENTINEL, ContentType::Html);
                el.append(CLOSE_SENTINEL, ContentType::Html);
                *found = Some(Found::Mount(name));
                Ok(())
            });
            (Cow::Owned(parsed), handler)
        })
        .collect();

    let output = rewrite_str(
        source,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| TemplateError::Parse(err.to_string()))?;

    let name = match found.into_inner() {
        None => return Err(TemplateError::NoMatch(selector.to_string())),
        Some(Found::Void(name)) => return Err(TemplateError::VoidMount(name)),
        Some(Found::Mount(name)) => name,
    };

    let open_end = output
        .find(OPEN_SENTINEL)
        .ok_or(TemplateError::MarkerMissing)?;
    // The end tag handler never runs for an element closed only by EOF
    let close = output
        .find(CLOSE_SENTINEL)
        .ok_or(TemplateError::UnclosedMount(name))?;

    Ok(MountSpan {
        open_end,
        close_start: close - OPEN_SENTINEL.len(),
    })
}

/// Parse every selector of a group, rejecting the whole group on the
/// first unsupported one.
fn parse_selector_groups(selector: &str) -> Result<Vec<Selector>, TemplateError> {
    let groups = split_selector_groups(selector);
    if groups.is_empty() {
        return Err(TemplateError::InvalidSelector(
            selector.to_string(),
            "empty selector".to_string(),
        ));
    }

    groups
        .iter()
        .map(|group| {
            group.parse::<Selector>().map_err(|err| {
                TemplateError::InvalidSelector(selector.to_string(), format!("`{group}`: {err}"))
            })
        })
        .collect()
}

/// Split `a, b[x=","], c` into trimmed groups, ignoring commas inside
/// brackets, parentheses and quotes.
fn split_selector_groups(selector: &str) -> Vec<String> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in selector.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                groups.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    groups.push(current);

    groups
        .into_iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect()
}
