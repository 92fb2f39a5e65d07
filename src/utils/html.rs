//! HTML utility functions.
//!
//! - `unescape()` - decode character references in attribute values
//! - `is_void_element()` - elements that cannot have children

use std::borrow::Cow;

/// Longest entity name we try to decode (`&#x10FFFF;` fits).
const MAX_ENTITY_LEN: usize = 10;

/// Unescape HTML entities back to characters.
///
/// Handles common named entities and numeric character references.
/// Anything that is not a terminated, known reference is kept verbatim,
/// so bare ampersands in URLs (`?a=1&b=2`) survive untouched.
pub fn unescape(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('&') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let decoded = after
            .find(';')
            .filter(|&end| end > 0 && end <= MAX_ENTITY_LEN)
            .and_then(|end| decode_entity(&after[..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                result.push(c);
                rest = &after[end + 1..];
            }
            None => {
                result.push('&');
                rest = after;
            }
        }
    }
    result.push_str(rest);

    Cow::Owned(result)
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00A0}'),
        s if s.starts_with("#x") || s.starts_with("#X") => {
            u32::from_str_radix(&s[2..], 16).ok().and_then(char::from_u32)
        }
        s if s.starts_with('#') => s[1..].parse().ok().and_then(char::from_u32),
        _ => None,
    }
}

/// Check if an HTML tag is a void element (cannot have children).
#[inline]
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}
