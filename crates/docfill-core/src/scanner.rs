//! Placeholder scanning.
//!
//! A placeholder token is `{{`, optional whitespace, a name made of ASCII letters,
//! digits, `.`, `-` or `_`, optional whitespace, then `}}`:
//!
//! ```text
//! Hello {{ name }}, balance {{balance}}.
//!          ^^^^              ^^^^^^^
//! ```
//!
//! There is no escaping. Anything that does not match the grammar (for example
//! `{{ first name }}`) is plain text.

use std::sync::LazyLock;

use regex::Regex;

/// The wire-visible token grammar. Capture group 1 is the placeholder name.
pub(crate) static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9._-]+)\s*\}\}").expect("Invalid placeholder token regex")
});

/// Return every placeholder name in `text`, in document order, duplicates included.
pub fn scan(text: &str) -> Vec<String> {
    TOKEN
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Like [`scan`], but each name appears once, at its first position.
pub fn distinct(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    scan(text)
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_basic() {
        assert_eq!(
            scan("Hello {{ name }}, balance {{balance}}."),
            vec!["name", "balance"]
        );
    }

    #[test]
    fn test_scan_keeps_duplicates_in_order() {
        assert_eq!(
            scan("{{a}} {{ b }} {{a}}\n{{\tc.d-e_f\t}}"),
            vec!["a", "b", "a", "c.d-e_f"]
        );
    }

    #[test]
    fn test_scan_no_tokens() {
        assert!(scan("plain text with { braces } and {{ }}").is_empty());
        assert!(scan("").is_empty());
    }

    #[test]
    fn test_scan_rejects_invalid_names() {
        assert!(scan("{{ first name }}").is_empty());
        assert!(scan("{{na$me}}").is_empty());
        assert!(scan("{name}").is_empty());
    }

    #[test]
    fn test_scan_non_overlapping() {
        // The first `{{` does not start a valid token; the inner one does.
        assert_eq!(scan("{{ {{x}} }}"), vec!["x"]);
        assert_eq!(scan("{{{x}}}"), vec!["x"]);
    }

    #[test]
    fn test_scan_is_pure() {
        let text = "Dear {{title}} {{ surname }}, ref {{ref.no}} / {{title}}";
        assert_eq!(scan(text), scan(text));
    }

    #[test]
    fn test_distinct() {
        assert_eq!(distinct("{{b}} {{a}} {{b}}"), vec!["b", "a"]);
    }
}
