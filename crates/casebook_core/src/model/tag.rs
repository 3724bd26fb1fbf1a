//! Tag name normalization.
//!
//! Tags are identified by name. Normalization trims the value and collapses
//! inner whitespace runs to one space; letter case is preserved, so
//! `"Rejestr umów"` and `"rejestr umów"` are distinct tags.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Maximum length of a tag name, in characters.
pub const TAG_NAME_MAX_CHARS: usize = 256;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Normalizes one tag value. Returns `None` for blank input.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(tag.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

/// Normalizes and deduplicates tag values, keeping first-occurrence order.
///
/// Blank values are dropped; callers that must reject them check with
/// [`normalize_tag`] first.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .filter_map(|tag| normalize_tag(tag))
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
