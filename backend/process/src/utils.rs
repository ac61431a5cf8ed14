use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Trims and collapses whitespace runs to a single space. Case is kept.
pub fn sanitize(input: &str) -> String {
    WHITESPACE.replace_all(input.trim(), " ").into_owned()
}
