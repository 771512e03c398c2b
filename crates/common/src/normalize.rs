//! URL normalization: applied at every boundary that writes, and
//! before every lookup. Two URLs are equivalent iff their normalizations are
//! byte-equal.

/// Normalize a raw URL:
/// lowercase the host, strip a single leading `www.`, drop a trailing `/` on
/// non-root paths, default scheme to `https`, preserve path case, query, and
/// fragment.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let (scheme, rest) = split_scheme(trimmed);

    let (authority, path_and_rest) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };

    let host = authority.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let path_and_rest = strip_trailing_slash(path_and_rest);

    format!("{scheme}://{host}{path_and_rest}")
}

fn split_scheme(s: &str) -> (&str, &str) {
    if let Some(rest) = s.strip_prefix("https://") {
        ("https", rest)
    } else if let Some(rest) = s.strip_prefix("http://") {
        ("http", rest)
    } else {
        ("https", s)
    }
}

/// Drop a single trailing `/` from the path component only, leaving any
/// query string or fragment untouched. The root path (`""` or `"/"`) is
/// never stripped.
fn strip_trailing_slash(path_and_rest: &str) -> String {
    if path_and_rest.is_empty() || path_and_rest == "/" {
        return path_and_rest.to_string();
    }

    let path_end = path_and_rest
        .find(['?', '#'])
        .unwrap_or(path_and_rest.len());
    let path = &path_and_rest[..path_end];
    let suffix = &path_and_rest[path_end..];

    if path.len() > 1 && path.ends_with('/') {
        format!("{}{}", &path[..path.len() - 1], suffix)
    } else {
        path_and_rest.to_string()
    }
}

/// Host extraction used by AuthPolicy (domain-match) without scheme/path, post-normalization.
pub fn host_of(normalized_url: &str) -> &str {
    let without_scheme = normalized_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(normalized_url);
    match without_scheme.find('/') {
        Some(idx) => &without_scheme[..idx],
        None => without_scheme,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_scheme_case_and_www() {
        assert_eq!(normalize("https://www.Example.COM/a/"), normalize("example.com/a"));
        assert_eq!(normalize("example.com/a"), normalize("https://example.com/a"));
    }

    #[test]
    fn is_idempotent() {
        let once = normalize("https://WWW.Example.com/Path/");
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn preserves_path_case_query_and_fragment() {
        let n = normalize("https://Example.com/Article-Name?x=1#frag");
        assert_eq!(n, "https://example.com/Article-Name?x=1#frag");
    }

    #[test]
    fn root_path_untouched() {
        assert_eq!(normalize("https://example.com/"), "https://example.com/");
        assert_eq!(normalize("https://example.com"), "https://example.com");
    }

    #[test]
    fn defaults_scheme_to_https() {
        assert_eq!(normalize("example.com/a"), "https://example.com/a");
    }

    #[test]
    fn trailing_slash_before_query_is_stripped() {
        assert_eq!(normalize("https://example.com/a/?x=1"), "https://example.com/a?x=1");
    }

    #[test]
    fn host_of_strips_scheme_and_path() {
        assert_eq!(host_of("https://example.com/a/b"), "example.com");
        assert_eq!(host_of("https://blog.example.com"), "blog.example.com");
    }
}
