//! JSKOS data model: concept schemes, concepts, and item references.
//!
//! Only the fields the backend reasons about are typed. Everything else an
//! upstream registry sends is kept in `extra` and written back unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::uri::normalize;

/// SKOS type URI marking an item as a concept scheme.
pub const SKOS_CONCEPT_SCHEME: &str = "http://www.w3.org/2004/02/skos/core#ConceptScheme";

/// SKOS type URI marking an item as a concept.
pub const SKOS_CONCEPT: &str = "http://www.w3.org/2004/02/skos/core#Concept";

/// Language tag to label.
pub type LanguageMap = BTreeMap<String, String>;

/// Set-valued JSKOS property. `None` entries are the JSKOS `null` marker
/// ("there are more members than listed"), so `[null]` is not empty.
pub type ItemSet = Vec<Option<ItemRef>>;

/// Reference to another item: a `{uri}` stub or a full embedded object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemRef {
    /// Create a URI-only stub.
    pub fn stub(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            extra: Map::new(),
        }
    }
}

/// URIs of all members of an item set, skipping `null` markers and
/// members without a URI.
pub fn member_uris(set: &Option<ItemSet>) -> impl Iterator<Item = &str> {
    set.iter()
        .flatten()
        .flatten()
        .filter_map(|item| item.uri.as_deref())
}

/// A concept scheme (vocabulary) as delivered by a registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptScheme {
    /// Canonical URI.
    pub uri: String,
    /// Alternative URIs, including deprecated ones still in circulation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pref_label: Option<LanguageMap>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notation: Vec<String>,
    /// An explicitly empty list means the registry does not provide concepts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concepts: Option<ItemSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_concepts: Option<ItemSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<ItemSet>,
    /// URI prefix shared by the scheme's concepts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Regular expression every concept URI of the scheme matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri_pattern: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConceptScheme {
    /// Create a scheme with only a URI set.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Add an identifier alias.
    pub fn with_identifier(mut self, alias: impl Into<String>) -> Self {
        self.identifier.push(alias.into());
        self
    }

    /// Set the concepts list.
    pub fn with_concepts(mut self, concepts: ItemSet) -> Self {
        self.concepts = Some(concepts);
        self
    }

    /// False only when `concepts` is present and empty.
    pub fn provides_concepts(&self) -> bool {
        !matches!(&self.concepts, Some(concepts) if concepts.is_empty())
    }

    /// Canonical URI followed by all identifier aliases.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.uri.as_str()).chain(self.identifier.iter().map(String::as_str))
    }

    /// JSKOS identity comparison: two schemes are the same when any of
    /// their URIs or identifiers coincide (trailing slashes ignored).
    pub fn same_as(&self, other: &ConceptScheme) -> bool {
        self.identities()
            .any(|a| other.identities().any(|b| normalize(a) == normalize(b)))
    }

    /// Whether the item is typed as a concept scheme.
    pub fn is_scheme_type(types: &[String]) -> bool {
        types.iter().any(|t| t == SKOS_CONCEPT_SCHEME)
    }
}

/// A single concept, fetched per request and never cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub uri: String,
    #[serde(default, rename = "type", skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pref_label: Option<LanguageMap>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notation: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broader: Option<ItemSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrower: Option<ItemSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestors: Option<ItemSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_scheme: Option<ItemSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_concept_of: Option<ItemSet>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Concept {
    /// Create a concept with only a URI set.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }
}

/// Set-valued properties reduced to `{uri}` stubs by [`compact_item`].
const STUB_PROPERTIES: &[&str] = &[
    "ancestors",
    "broader",
    "narrower",
    "inScheme",
    "topConcepts",
    "concepts",
    "topConceptOf",
];

/// Prepare a serialized item (or list of items) for output.
///
/// Removes keys starting with `_` and replaces members of set-valued
/// relation properties by URI-only stubs. Members without a URI are kept.
pub fn compact_item(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(compact_object),
        other => compact_object(other),
    }
}

fn compact_object(value: &mut Value) {
    let Value::Object(map) = value else {
        return;
    };
    map.retain(|key, _| !key.starts_with('_'));
    for prop in STUB_PROPERTIES {
        if let Some(Value::Array(members)) = map.get_mut(*prop) {
            for member in members.iter_mut() {
                if let Some(uri) = member.get("uri").cloned() {
                    *member = serde_json::json!({ "uri": uri });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scheme_deserialize_keeps_extra_fields() {
        let scheme: ConceptScheme = serde_json::from_value(json!({
            "uri": "http://x/a",
            "identifier": ["http://old/a"],
            "type": [SKOS_CONCEPT_SCHEME],
            "prefLabel": {"en": "A"},
            "license": [{"uri": "http://creativecommons.org/publicdomain/zero/1.0/"}],
            "uriPattern": "^http://x/a/(.+)$"
        }))
        .unwrap();

        assert_eq!(scheme.uri, "http://x/a");
        assert_eq!(scheme.identifier, vec!["http://old/a"]);
        assert_eq!(scheme.uri_pattern.as_deref(), Some("^http://x/a/(.+)$"));
        assert!(scheme.extra.contains_key("license"));

        let back = serde_json::to_value(&scheme).unwrap();
        assert_eq!(back["prefLabel"]["en"], "A");
        assert!(back.get("concepts").is_none());
        assert!(back.get("license").is_some());
    }

    #[test]
    fn test_provides_concepts() {
        assert!(ConceptScheme::new("http://x/a").provides_concepts());
        assert!(!ConceptScheme::new("http://x/a")
            .with_concepts(vec![])
            .provides_concepts());
        assert!(ConceptScheme::new("http://x/a")
            .with_concepts(vec![Some(ItemRef::stub("http://x/a/1"))])
            .provides_concepts());
    }

    #[test]
    fn test_null_marker_counts_as_concepts() {
        let scheme: ConceptScheme =
            serde_json::from_value(json!({"uri": "http://x/a", "concepts": [null]})).unwrap();
        assert!(scheme.provides_concepts());
        assert_eq!(serde_json::to_value(&scheme).unwrap()["concepts"], json!([null]));
    }

    #[test]
    fn test_same_as_by_identifier_and_slash() {
        let a = ConceptScheme::new("http://x/a").with_identifier("http://old/a");
        assert!(a.same_as(&ConceptScheme::new("http://old/a/")));
        assert!(a.same_as(&ConceptScheme::new("http://x/a/")));
        assert!(!a.same_as(&ConceptScheme::new("http://x/b")));
    }

    #[test]
    fn test_member_uris_skips_null_and_anonymous() {
        let set = Some(vec![
            Some(ItemRef::stub("http://x/1")),
            None,
            Some(ItemRef::default()),
            Some(ItemRef::stub("http://x/2")),
        ]);
        let uris: Vec<&str> = member_uris(&set).collect();
        assert_eq!(uris, vec!["http://x/1", "http://x/2"]);
    }

    #[test]
    fn test_compact_item_strips_private_keys_and_reduces_relations() {
        let mut item = json!({
            "uri": "http://x/a/1",
            "_source": "http://api/data?uri=...",
            "prefLabel": {"en": "One"},
            "broader": [{"uri": "http://x/a/0", "prefLabel": {"en": "Zero"}}],
            "narrower": [null, {"prefLabel": {"en": "anonymous"}}],
        });
        compact_item(&mut item);

        assert!(item.get("_source").is_none());
        assert_eq!(item["broader"], json!([{"uri": "http://x/a/0"}]));
        assert_eq!(item["narrower"], json!([null, {"prefLabel": {"en": "anonymous"}}]));
        assert_eq!(item["prefLabel"]["en"], "One");
    }

    #[test]
    fn test_compact_item_on_list() {
        let mut list = json!([{"uri": "a", "_x": 1}, {"uri": "b", "_y": 2}]);
        compact_item(&mut list);
        assert_eq!(list, json!([{"uri": "a"}, {"uri": "b"}]));
    }
}
