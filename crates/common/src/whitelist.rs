//! Glob-style URL whitelist matching.

use globset::{Glob, GlobBuilder};

/// True if `url` matches at least one of `patterns`. An empty pattern list
/// means "accept any URL".
///
/// Matching is anchored (the entire URL must match); `*` matches any
/// characters including `/`. Host matching is case-insensitive; path
/// matching is case-sensitive. Achieving that split is left to callers
/// that pre-normalize URLs (see `blogpipe_common::normalize`), so this
/// function itself just does a literal glob match against whatever string
/// it's given.
pub fn url_whitelisted(url: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }

    patterns.iter().any(|pattern| matches_pattern(url, pattern))
}

fn matches_pattern(url: &str, pattern: &str) -> bool {
    let glob = match build_glob(pattern) {
        Ok(g) => g,
        Err(_) => return false,
    };
    glob.compile_matcher().is_match(url)
}

fn build_glob(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .case_insensitive(false)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patterns_accept_anything() {
        assert!(url_whitelisted("https://example.com/a", &[]));
    }

    #[test]
    fn wildcard_matches_any_path() {
        let patterns = vec!["https://example.com/blog/*".to_string()];
        assert!(url_whitelisted(
            "https://example.com/blog/my-post",
            &patterns
        ));
        assert!(!url_whitelisted(
            "https://example.com/news/my-post",
            &patterns
        ));
    }

    #[test]
    fn wildcard_crosses_slash_boundaries() {
        let patterns = vec!["https://example.com/*".to_string()];
        assert!(url_whitelisted(
            "https://example.com/a/b/c",
            &patterns
        ));
    }

    #[test]
    fn match_is_anchored() {
        let patterns = vec!["https://example.com/blog/specific-post".to_string()];
        assert!(!url_whitelisted(
            "https://example.com/blog/specific-post-2",
            &patterns
        ));
    }
}
