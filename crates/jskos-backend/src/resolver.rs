//! Classification of incoming lookups.
//!
//! A lookup arrives as the path below the namespace, split into a scheme
//! segment and a concept segment, plus an optional explicit `uri`
//! parameter. [`classify`] decides what is being asked for without
//! touching the index; the facade then dispatches on the [`Target`].

use jskos_core::uri::{is_valid_uri, normalize, same_uri};
use jskos_core::{Error, Result};

/// One lookup: `namespace/<scheme_segment>/<concept_segment>?uri=<uri>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupRequest {
    pub scheme_segment: Option<String>,
    pub concept_segment: Option<String>,
    /// Explicit URI parameter; wins over the path when both are given.
    pub uri: Option<String>,
}

impl LookupRequest {
    /// Build a request. Empty strings count as absent.
    pub fn new(scheme_segment: Option<&str>, concept_segment: Option<&str>, uri: Option<&str>) -> Self {
        Self {
            scheme_segment: present(scheme_segment),
            concept_segment: present(concept_segment),
            uri: present(uri),
        }
    }

    /// The namespace root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Lookup by explicit URI only.
    pub fn for_uri(uri: &str) -> Self {
        Self::new(None, None, Some(uri))
    }
}

fn present(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

/// What a lookup addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The scheme listing.
    Schemes,
    /// A scheme, by URI or alias.
    Scheme(String),
    /// A concept addressed through a scheme path. The scheme part may be an
    /// alias; the concept URI is built from the canonical scheme URI.
    SchemeConcept { scheme: String, local: String },
    /// A concept by full URI.
    Concept(String),
    /// A URI that may name a scheme or a concept; schemes are tried first.
    Item(String),
}

/// The URI a scheme segment stands for: the segment itself when it is an
/// absolute URI, else `namespace + segment + "/"`.
pub fn scheme_uri(namespace: &str, segment: &str) -> String {
    if is_valid_uri(segment) {
        segment.to_string()
    } else {
        format!("{}/{}/", normalize(namespace), segment.trim_matches('/'))
    }
}

/// Classify a lookup.
///
/// With `listing` disabled the namespace root is itself the scheme: the
/// bare root resolves that scheme and paths below it are plain item URIs.
/// An explicit `uri` that is not an absolute URI is rejected.
pub fn classify(namespace: &str, listing: bool, request: &LookupRequest) -> Result<Target> {
    let explicit = match request.uri.as_deref() {
        Some(uri) if !is_valid_uri(uri) => {
            return Err(Error::InvalidInput(format!("Invalid URI {uri}")));
        }
        other => other,
    };

    let target = match (
        request.scheme_segment.as_deref(),
        request.concept_segment.as_deref(),
        explicit,
    ) {
        (None, None, None) if listing => Target::Schemes,
        (None, None, None) => Target::Scheme(namespace.to_string()),
        (None, None, Some(uri)) if same_uri(uri, namespace) => {
            if listing {
                Target::Schemes
            } else {
                Target::Scheme(namespace.to_string())
            }
        }
        (None, None, Some(uri)) => Target::Item(uri.to_string()),
        (None, Some(_), None) => {
            return Err(Error::InvalidInput("concept segment without scheme segment".into()));
        }
        (_, Some(_), Some(uri)) => Target::Concept(uri.to_string()),
        (Some(voc), None, Some(uri)) => {
            let scheme = scheme_uri(namespace, voc);
            if same_uri(uri, &scheme) {
                Target::Scheme(scheme)
            } else {
                Target::Concept(uri.to_string())
            }
        }
        (Some(voc), None, None) if listing => Target::Scheme(scheme_uri(namespace, voc)),
        (Some(voc), None, None) => Target::Item(format!("{}{}", namespace, voc)),
        (Some(voc), Some(local), None) if listing => Target::SchemeConcept {
            scheme: scheme_uri(namespace, voc),
            local: local.to_string(),
        },
        (Some(voc), Some(local), None) => Target::Item(format!("{}{}/{}", namespace, voc, local)),
    };

    Ok(target)
}
