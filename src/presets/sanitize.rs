use regex::Regex;
use std::sync::LazyLock;

use crate::fsutil::stem_of;

// Anything that isn't a word character collapses to one underscore.
static UNSAFE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]+").unwrap());

static UNDERSCORE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());

static TAG_SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s/]+").unwrap());

static TAG_UNSAFE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_.\-]").unwrap());

/// Placeholder for an empty attribute tag.
pub const MISSING_TAG: &str = "N_A";

/// Make a preset filename ASCII- and filesystem-safe.
///
/// Drops the extension and every non-ASCII character, turns each run of
/// characters outside `[A-Za-z0-9_]` into one underscore, then collapses
/// repeated underscores and trims them from both ends. The result only
/// contains `[A-Za-z0-9_]` and `sanitize_filename(sanitize_filename(x))`
/// equals `sanitize_filename(x)`.
pub fn sanitize_filename(filename: &str) -> String {
    let stem = stem_of(filename);
    let ascii: String = stem.chars().filter(char::is_ascii).collect();
    let replaced = UNSAFE_RUN_RE.replace_all(&ascii, "_");
    collapse_underscores(&replaced).trim_matches('_').to_string()
}

/// Collapse every run of underscores to a single one.
pub fn collapse_underscores(name: &str) -> String {
    UNDERSCORE_RUN_RE.replace_all(name, "_").into_owned()
}

/// Clean an attribute tag for use in a filename.
///
/// Empty tags become `N_A`. Whitespace and slashes turn into underscores;
/// anything outside `[A-Za-z0-9_.-]` is removed. A tag made only of
/// unsupported characters comes back empty.
pub fn sanitize_tag(tag: &str) -> String {
    if tag.is_empty() {
        return MISSING_TAG.to_string();
    }
    let separated = TAG_SEPARATOR_RE.replace_all(tag, "_");
    TAG_UNSAFE_RE.replace_all(&separated, "").into_owned()
}
