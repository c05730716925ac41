//! Merging scheme listings from several registries into one index.
//!
//! Registries are visited in priority order and schemes in response order,
//! so merging identical inputs always yields the same list. A scheme is
//! first checked against its registry's inclusion policy and only then
//! against the schemes already accepted: an excluded scheme never claims
//! its URIs, and a lower-priority registry may still supply it.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use tracing::{trace, warn};

use jskos_core::uri::normalize;
use jskos_core::ConceptScheme;

use crate::binding::RegistryBinding;

/// A scheme accepted into the index, tagged with the registry it came from.
#[derive(Debug, Clone)]
pub struct IndexedScheme {
    pub scheme: ConceptScheme,
    /// Registry that serves this scheme's concepts.
    pub registry: Arc<RegistryBinding>,
    pub provides_concepts: bool,
    uri_pattern: Option<Regex>,
}

impl IndexedScheme {
    pub fn new(scheme: ConceptScheme, registry: Arc<RegistryBinding>) -> Self {
        let uri_pattern = scheme.uri_pattern.as_deref().and_then(|pattern| {
            match Regex::new(&format!("^(?:{pattern})$")) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(uri = %scheme.uri, error = %e, "Ignoring invalid uriPattern");
                    None
                }
            }
        });
        Self {
            provides_concepts: scheme.provides_concepts(),
            scheme,
            registry,
            uri_pattern,
        }
    }

    /// Canonical URI.
    pub fn uri(&self) -> &str {
        &self.scheme.uri
    }

    /// Whether the scheme's `uriPattern` matches `uri` completely.
    pub fn matches_pattern(&self, uri: &str) -> bool {
        self.uri_pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(uri))
    }
}

/// Merge per-registry listings, given in priority order.
pub fn merge<I>(listings: I) -> Vec<IndexedScheme>
where
    I: IntoIterator<Item = (Arc<RegistryBinding>, Vec<ConceptScheme>)>,
{
    let mut merged = Vec::new();
    let mut claimed: HashSet<String> = HashSet::new();

    for (binding, schemes) in listings {
        for scheme in schemes {
            if binding.require_concepts && !scheme.provides_concepts() {
                trace!(uri = %scheme.uri, registry = %binding.base(), "Excluded: no concepts");
                continue;
            }
            if scheme.identities().any(|id| claimed.contains(normalize(id))) {
                trace!(uri = %scheme.uri, registry = %binding.base(), "Excluded: already listed");
                continue;
            }
            claimed.extend(scheme.identities().map(|id| normalize(id).to_string()));
            merged.push(IndexedScheme::new(scheme, binding.clone()));
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use jskos_core::ItemRef;
    use jskos_registry::MockRegistry;

    fn binding(base: &str, require_concepts: bool, priority: usize) -> Arc<RegistryBinding> {
        Arc::new(RegistryBinding::new(
            Arc::new(MockRegistry::new(base)),
            require_concepts,
            priority,
        ))
    }

    fn with_concepts(uri: &str) -> ConceptScheme {
        ConceptScheme::new(uri).with_concepts(vec![Some(ItemRef::stub(format!("{uri}/c1")))])
    }

    fn without_concepts(uri: &str) -> ConceptScheme {
        ConceptScheme::new(uri).with_concepts(vec![])
    }

    #[test]
    fn test_first_registry_wins() {
        let a = binding("mock://a", false, 0);
        let b = binding("mock://b", false, 1);
        let mut from_a = ConceptScheme::new("http://x/a");
        from_a.notation = vec!["A".into()];
        let mut from_b = ConceptScheme::new("http://x/a/");
        from_b.notation = vec!["B".into()];

        let merged = merge(vec![(a, vec![from_a]), (b, vec![from_b])]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].scheme.notation, vec!["A"]);
        assert_eq!(merged[0].registry.base(), "mock://a");
    }

    #[test]
    fn test_dedup_by_identifier() {
        let a = binding("mock://a", false, 0);
        let b = binding("mock://b", false, 1);
        let merged = merge(vec![
            (a, vec![ConceptScheme::new("http://x/a").with_identifier("http://old/a")]),
            (b, vec![ConceptScheme::new("http://old/a")]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].uri(), "http://x/a");
    }

    #[test]
    fn test_dedup_within_one_registry() {
        let a = binding("mock://a", false, 0);
        let merged = merge(vec![(
            a,
            vec![
                ConceptScheme::new("http://x/a"),
                ConceptScheme::new("http://x/b"),
                ConceptScheme::new("http://x/b").with_identifier("http://x/a"),
            ],
        )]);
        let uris: Vec<&str> = merged.iter().map(|s| s.uri()).collect();
        assert_eq!(uris, vec!["http://x/a", "http://x/b"]);
    }

    #[test]
    fn test_policy_excludes_empty_concepts() {
        let strict = binding("mock://strict", true, 0);
        let merged = merge(vec![(
            strict,
            vec![without_concepts("http://x/a"), ConceptScheme::new("http://x/b")],
        )]);
        let uris: Vec<&str> = merged.iter().map(|s| s.uri()).collect();
        assert_eq!(uris, vec!["http://x/b"]);
    }

    #[test]
    fn test_policy_keeps_empty_concepts_when_not_required() {
        let lenient = binding("mock://lenient", false, 0);
        let merged = merge(vec![(lenient, vec![without_concepts("http://x/a")])]);
        assert_eq!(merged.len(), 1);
        assert!(!merged[0].provides_concepts);
    }

    #[test]
    fn test_excluded_scheme_does_not_shadow_later_registry() {
        // A (strict) has no concepts for x/a, B (lenient) does
        let a = binding("mock://a", true, 0);
        let b = binding("mock://b", false, 1);
        let merged = merge(vec![
            (a.clone(), vec![without_concepts("http://x/a")]),
            (b.clone(), vec![with_concepts("http://x/a")]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].registry.base(), "mock://b");
        assert!(merged[0].provides_concepts);

        // Reversed order: B is first and wins outright
        let merged = merge(vec![
            (b, vec![with_concepts("http://x/a")]),
            (a, vec![without_concepts("http://x/a")]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].registry.base(), "mock://b");
    }

    #[test]
    fn test_merge_is_deterministic() {
        let a = binding("mock://a", true, 0);
        let b = binding("mock://b", false, 1);
        let listings = || {
            vec![
                (a.clone(), vec![with_concepts("http://x/2"), without_concepts("http://x/1")]),
                (b.clone(), vec![without_concepts("http://x/1"), with_concepts("http://x/3")]),
            ]
        };
        let first: Vec<String> = merge(listings()).iter().map(|s| s.uri().to_string()).collect();
        let second: Vec<String> = merge(listings()).iter().map(|s| s.uri().to_string()).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["http://x/2", "http://x/1", "http://x/3"]);
    }

    #[test]
    fn test_no_two_entries_share_an_identity() {
        let a = binding("mock://a", false, 0);
        let b = binding("mock://b", false, 1);
        let merged = merge(vec![
            (
                a,
                vec![
                    ConceptScheme::new("http://x/a").with_identifier("http://alias/1"),
                    ConceptScheme::new("http://x/b"),
                ],
            ),
            (
                b,
                vec![
                    ConceptScheme::new("http://x/c").with_identifier("http://alias/1/"),
                    ConceptScheme::new("http://x/b/"),
                    ConceptScheme::new("http://x/d"),
                ],
            ),
        ]);

        let mut seen = HashSet::new();
        for entry in &merged {
            for id in entry.scheme.identities() {
                assert!(seen.insert(normalize(id).to_string()), "duplicate identity {id}");
            }
        }
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_uri_pattern_is_anchored() {
        let a = binding("mock://a", false, 0);
        let mut scheme = ConceptScheme::new("http://x/ddc/");
        scheme.uri_pattern = Some(r"http://dewey\.info/class/(\d+)/e23/".into());
        let indexed = IndexedScheme::new(scheme, a);

        assert!(indexed.matches_pattern("http://dewey.info/class/612/e23/"));
        assert!(!indexed.matches_pattern("http://dewey.info/class/612/e23/extra"));
    }

    #[test]
    fn test_invalid_uri_pattern_ignored() {
        let a = binding("mock://a", false, 0);
        let mut scheme = ConceptScheme::new("http://x/a");
        scheme.uri_pattern = Some("(".into());
        let indexed = IndexedScheme::new(scheme, a);
        assert!(!indexed.matches_pattern("("));
    }
}
