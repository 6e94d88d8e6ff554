//! Path pattern compilation and matching.
//!
//! Patterns use one syntax: colon-prefixed segment captures (`:name`)
//! matching any non-slash run. Patterns are anchored (full-path match).
//! Grounded on the same regex-compilation approach the framework uses
//! for its route-pattern rate-limit matcher, adapted to produce named
//! capture maps instead of a rate-limit config lookup.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// A compiled path pattern, e.g. `/api/items/:id`.
#[derive(Debug, Clone)]
pub struct Pattern {
    original: String,
    regex: Regex,
    param_names: Vec<String>,
}

impl Pattern {
    /// Compile a pattern string into a matcher.
    ///
    /// # Panics
    ///
    /// Panics if the pattern contains characters that cannot be turned
    /// into a valid regex; this only happens for patterns that are not
    /// plain ASCII path segments, which callers control at registration
    /// time.
    #[must_use]
    pub fn compile(pattern: &str) -> Self {
        let mut regex_str = String::from("^");
        let mut param_names = Vec::new();

        for segment in pattern.split('/') {
            if let Some(name) = segment.strip_prefix(':') {
                param_names.push(name.to_string());
                regex_str.push_str("/([^/]+)");
            } else if segment.is_empty() {
                // leading slash or doubled slash; emitted verbatim below
            } else {
                regex_str.push('/');
                for c in segment.chars() {
                    if ".+*?()[]^$|\\{}".contains(c) {
                        regex_str.push('\\');
                    }
                    regex_str.push(c);
                }
            }
        }
        if regex_str == "^" {
            regex_str.push('/');
        }
        regex_str.push('$');

        let regex = Regex::new(&regex_str)
            .unwrap_or_else(|e| panic!("invalid path pattern {pattern:?}: {e}"));

        Self {
            original: pattern.to_string(),
            regex,
            param_names,
        }
    }

    /// The original pattern string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Match a pathname (no query string) against this pattern.
    ///
    /// If a capture name repeats within the pattern, the last capture
    /// wins (kept conservative per the spec, which does not strongly
    /// guarantee behaviour on repeated names either way).
    #[must_use]
    pub fn matches(&self, pathname: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(pathname)?;
        let mut params = HashMap::with_capacity(self.param_names.len());
        for (i, name) in self.param_names.iter().enumerate() {
            if let Some(m) = caps.get(i + 1) {
                params.insert(name.clone(), m.as_str().to_string());
            }
        }
        Some(params)
    }
}

static SCHEME_AUTHORITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^/]*").expect("valid regex"));

/// Split a URL into (pathname, query map), accepting both bare
/// pathnames (`/a/b?x=1`) and full URLs with an authority
/// (`ws://host/a/b?x=1`).
#[must_use]
pub fn split_url(url: &str) -> (String, HashMap<String, String>) {
    let without_authority = SCHEME_AUTHORITY.replace(url, "");
    let (pathname, query_str) = match without_authority.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (without_authority.as_ref(), None),
    };

    let pathname = if pathname.is_empty() { "/" } else { pathname };
    let query = query_str.map(parse_query_string).unwrap_or_default();
    (pathname.to_string(), query)
}

/// Parse a `key=value&key2=value2` query string into a raw-string map.
///
/// Later occurrences of a repeated key overwrite earlier ones.
#[must_use]
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let mut parts = pair.splitn(2, '=');
        let key = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or("");
        if !key.is_empty() {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_pattern_matches_root() {
        let pattern = Pattern::compile("/");
        let params = pattern.matches("/").unwrap();
        assert!(params.is_empty());
        assert!(pattern.matches("/x").is_none());
    }

    #[test]
    fn single_capture() {
        let pattern = Pattern::compile("/api/items/:id");
        let params = pattern.matches("/api/items/42").unwrap();
        assert_eq!(params.get("id"), Some(&"42".to_string()));
        assert!(pattern.matches("/api/items/42/extra").is_none());
    }

    #[test]
    fn two_captures() {
        let pattern = Pattern::compile("/:a/:b");
        let params = pattern.matches("/x/y").unwrap();
        assert_eq!(params.get("a"), Some(&"x".to_string()));
        assert_eq!(params.get("b"), Some(&"y".to_string()));
    }

    #[test]
    fn exact_path_no_params() {
        let pattern = Pattern::compile("/api/test");
        assert!(pattern.matches("/api/test").is_some());
        assert!(pattern.matches("/api/test2").is_none());
    }

    #[test]
    fn split_url_handles_pathname_only() {
        let (path, query) = split_url("/api/items/42");
        assert_eq!(path, "/api/items/42");
        assert!(query.is_empty());
    }

    #[test]
    fn split_url_handles_query_string() {
        let (path, query) = split_url("/api/items?sort=asc&page=2");
        assert_eq!(path, "/api/items");
        assert_eq!(query.get("sort"), Some(&"asc".to_string()));
        assert_eq!(query.get("page"), Some(&"2".to_string()));
    }

    #[test]
    fn split_url_handles_full_url_with_authority() {
        let (path, query) = split_url("ws://localhost:8080/api/items/1?x=1");
        assert_eq!(path, "/api/items/1");
        assert_eq!(query.get("x"), Some(&"1".to_string()));
    }

    #[test]
    fn repeated_query_key_keeps_last() {
        let query = parse_query_string("a=1&a=2");
        assert_eq!(query.get("a"), Some(&"2".to_string()));
    }
}
