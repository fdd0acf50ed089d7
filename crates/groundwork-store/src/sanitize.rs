//! Free-text query sanitation for the full-text path.
//!
//! Natural-language punctuation must not be parsed as query-syntax
//! operators. Reserved characters are substituted with spaces rather than
//! escaped: failing the whole query is worse than slightly degraded recall.

/// Characters reserved by the full-text query syntax.
const RESERVED: &[char] = &[
    '+', '-', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\', '/',
];

/// Replace reserved query-syntax characters with spaces and collapse
/// repeated whitespace.
///
/// An empty result tells the caller to short-circuit retrieval without
/// touching the data store.
pub fn sanitize(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if RESERVED.contains(&c) { ' ' } else { c })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
