//! URI helpers shared by the index and the resolver.
//!
//! Registries disagree about trailing slashes, so identity comparisons go
//! through [`normalize`].

use reqwest::Url;

/// Strip trailing slashes.
pub fn normalize(uri: &str) -> &str {
    uri.trim_end_matches('/')
}

/// Whether two URIs are equal ignoring trailing slashes.
pub fn same_uri(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Whether `value` is an absolute URI (has a scheme, no whitespace).
pub fn is_valid_uri(value: &str) -> bool {
    !value.chars().any(char::is_whitespace) && Url::parse(value).is_ok()
}

/// The part of `uri` after `prefix`, if `prefix` covers `uri` up to a
/// segment boundary.
///
/// Trailing slashes of `prefix` are ignored. The remainder is empty or
/// starts with `/` or `#`, unless `prefix` itself ends with `#`, in which
/// case any remainder is accepted.
pub fn remainder_after<'a>(uri: &'a str, prefix: &str) -> Option<&'a str> {
    let trimmed = normalize(prefix);
    if trimmed.is_empty() {
        return None;
    }
    let rest = uri.strip_prefix(trimmed)?;
    if rest.is_empty() || rest.starts_with('/') || rest.starts_with('#') || trimmed.ends_with('#')
    {
        Some(rest)
    } else {
        None
    }
}

/// Replace the `from` prefix of `uri` by `to`.
///
/// Returns `None` when `from` does not cover `uri` (see [`remainder_after`]).
pub fn rebase(uri: &str, from: &str, to: &str) -> Option<String> {
    let rest = remainder_after(uri, from)?;
    if rest.is_empty() {
        return Some(to.to_string());
    }
    let base = normalize(to);
    if rest.starts_with('/') || rest.starts_with('#') {
        Some(format!("{base}{rest}"))
    } else {
        Some(format!("{base}#{rest}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("http://x/a/"), "http://x/a");
        assert_eq!(normalize("http://x/a"), "http://x/a");
        assert_eq!(normalize("http://x/a//"), "http://x/a");
    }

    #[test]
    fn test_same_uri() {
        assert!(same_uri("http://x/a", "http://x/a/"));
        assert!(!same_uri("http://x/a", "http://x/ab"));
    }

    #[test]
    fn test_is_valid_uri() {
        assert!(is_valid_uri("http://example.org/voc/"));
        assert!(is_valid_uri("urn:isbn:0451450523"));
        assert!(!is_valid_uri("ddc"));
        assert!(!is_valid_uri("http://example.org/a b"));
        assert!(!is_valid_uri(""));
    }

    #[test]
    fn test_remainder_after_boundaries() {
        assert_eq!(remainder_after("http://x/a/1", "http://x/a"), Some("/1"));
        assert_eq!(remainder_after("http://x/a/1", "http://x/a/"), Some("/1"));
        assert_eq!(remainder_after("http://x/a", "http://x/a/"), Some(""));
        assert_eq!(remainder_after("http://x/a#c", "http://x/a"), Some("#c"));
        assert_eq!(remainder_after("http://x/ab", "http://x/a"), None);
        assert_eq!(remainder_after("http://y/a/1", "http://x/a"), None);
        assert_eq!(remainder_after("http://x/a/1", "/"), None);
    }

    #[test]
    fn test_remainder_after_hash_prefix() {
        assert_eq!(remainder_after("http://x/v#c1", "http://x/v#"), Some("c1"));
    }

    #[test]
    fn test_rebase_alias_onto_canonical() {
        assert_eq!(
            rebase("http://old/a/item1", "http://old/a", "http://x/a").as_deref(),
            Some("http://x/a/item1")
        );
        assert_eq!(
            rebase("http://old/a/item1", "http://old/a/", "http://x/a/").as_deref(),
            Some("http://x/a/item1")
        );
        assert_eq!(
            rebase("http://old/a/", "http://old/a", "http://x/a/").as_deref(),
            Some("http://x/a/")
        );
        assert_eq!(
            rebase("http://old/v#c1", "http://old/v#", "http://x/v").as_deref(),
            Some("http://x/v#c1")
        );
        assert_eq!(rebase("http://other/1", "http://old/a", "http://x/a"), None);
    }
}
