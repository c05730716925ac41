//! Registry backed by a newline-delimited JSKOS file.
//!
//! Every line starting with `{` is one JSKOS item. Items typed
//! `skos:ConceptScheme` are schemes, all other items are concepts. The file
//! is re-read on every `list_schemes` call, so each refresh cycle picks up
//! edits without a file watcher.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use jskos_core::uri::same_uri;
use jskos_core::{member_uris, Concept, ConceptScheme, ItemRef, RegistryClient, Result};

/// Parsed content of a JSKOS file.
#[derive(Debug, Default)]
struct FileItems {
    schemes: Vec<ConceptScheme>,
    /// Concepts in file order.
    concepts: Vec<Concept>,
    by_uri: HashMap<String, usize>,
}

impl FileItems {
    fn parse(source: &str, content: &str) -> Self {
        let mut items = FileItems::default();

        for (index, line) in content.lines().enumerate() {
            if !line.starts_with('{') {
                continue;
            }
            let value: Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(e) => {
                    warn!(registry = source, line = index + 1, error = %e, "Skipping invalid JSON line");
                    continue;
                }
            };
            let is_scheme = value
                .get("type")
                .and_then(Value::as_array)
                .is_some_and(|types| {
                    types
                        .iter()
                        .any(|t| t.as_str() == Some(jskos_core::SKOS_CONCEPT_SCHEME))
                });

            let decoded = if is_scheme {
                serde_json::from_value::<ConceptScheme>(value).map(|s| items.schemes.push(s))
            } else {
                serde_json::from_value::<Concept>(value).map(|c| {
                    items.by_uri.insert(c.uri.clone(), items.concepts.len());
                    items.concepts.push(c);
                })
            };
            if let Err(e) = decoded {
                warn!(registry = source, line = index + 1, error = %e, "Skipping malformed JSKOS item");
            }
        }

        items
    }

    fn concept(&self, uri: &str) -> Option<&Concept> {
        self.by_uri.get(uri).map(|&i| &self.concepts[i])
    }

    fn narrower(&self, uri: &str) -> Vec<Concept> {
        self.concepts
            .iter()
            .filter(|c| member_uris(&c.broader).any(|b| b == uri))
            .cloned()
            .collect()
    }

    fn ancestors(&self, uri: &str) -> Vec<Concept> {
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([uri.to_string()]);
        let mut current = self.concept(uri);

        while let Some(concept) = current {
            let Some(parent) = member_uris(&concept.broader).next() else {
                break;
            };
            if !seen.insert(parent.to_string()) {
                break;
            }
            current = self.concept(parent);
            if let Some(parent) = current {
                ancestors.push(parent.clone());
            }
        }

        ancestors
    }

    fn top(&self, scheme_uri: &str) -> Vec<Concept> {
        self.concepts
            .iter()
            .filter(|c| {
                member_uris(&c.top_concept_of).any(|s| same_uri(s, scheme_uri))
                    || (member_uris(&c.broader).next().is_none()
                        && member_uris(&c.in_scheme).any(|s| same_uri(s, scheme_uri)))
            })
            .cloned()
            .collect()
    }
}

/// Read-only registry over a local JSKOS file.
pub struct FileRegistry {
    path: PathBuf,
    base: String,
    items: RwLock<Option<Arc<FileItems>>>,
}

impl FileRegistry {
    /// Create a registry for `path`. Nothing is read until the first call.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let base = path.display().to_string();
        Self {
            path,
            base,
            items: RwLock::new(None),
        }
    }

    /// Re-read the file and replace the loaded items.
    async fn reload(&self) -> Result<Arc<FileItems>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let items = Arc::new(FileItems::parse(&self.base, &content));
        info!(
            registry = %self.base,
            scheme_count = items.schemes.len(),
            concept_count = items.concepts.len(),
            "Loaded JSKOS items from file"
        );
        *self.items.write().await = Some(items.clone());
        Ok(items)
    }

    /// Loaded items, reading the file if it was never read.
    async fn items(&self) -> Result<Arc<FileItems>> {
        if let Some(items) = self.items.read().await.as_ref() {
            return Ok(items.clone());
        }
        self.reload().await
    }
}

#[async_trait]
impl RegistryClient for FileRegistry {
    fn base(&self) -> &str {
        &self.base
    }

    #[instrument(skip(self), fields(subsystem = "registry", component = "file", op = "list_schemes", registry = %self.base))]
    async fn list_schemes(&self, limit: usize) -> Result<Vec<ConceptScheme>> {
        let items = self.reload().await?;
        Ok(items.schemes.iter().take(limit).cloned().collect())
    }

    #[instrument(skip(self, properties), fields(subsystem = "registry", component = "file", op = "get_concept", registry = %self.base))]
    async fn get_concept(&self, uri: &str, properties: &[&str]) -> Result<Option<Concept>> {
        let items = self.items().await?;
        let Some(concept) = items.concept(uri) else {
            debug!("Concept not in file");
            return Ok(None);
        };

        let mut concept = concept.clone();
        if properties.contains(&"narrower") && concept.narrower.is_none() {
            concept.narrower = Some(stubs(items.narrower(uri)));
        }
        if properties.contains(&"ancestors") && concept.ancestors.is_none() {
            concept.ancestors = Some(stubs(items.ancestors(uri)));
        }
        Ok(Some(concept))
    }

    async fn get_top(&self, scheme_uri: &str) -> Result<Vec<Concept>> {
        Ok(self.items().await?.top(scheme_uri))
    }

    async fn get_narrower(&self, concept_uri: &str) -> Result<Vec<Concept>> {
        Ok(self.items().await?.narrower(concept_uri))
    }

    async fn get_ancestors(&self, concept_uri: &str) -> Result<Vec<Concept>> {
        Ok(self.items().await?.ancestors(concept_uri))
    }
}

fn stubs(concepts: Vec<Concept>) -> Vec<Option<ItemRef>> {
    concepts
        .into_iter()
        .map(|c| Some(ItemRef::stub(c.uri)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEMS: &str = r#"{"uri": "http://x/a", "type": ["http://www.w3.org/2004/02/skos/core#ConceptScheme"], "prefLabel": {"en": "A"}}
{"uri": "http://x/a/1", "inScheme": [{"uri": "http://x/a"}], "topConceptOf": [{"uri": "http://x/a"}]}
{"uri": "http://x/a/1.1", "inScheme": [{"uri": "http://x/a"}], "broader": [{"uri": "http://x/a/1"}]}
{"uri": "http://x/a/1.1.1", "inScheme": [{"uri": "http://x/a"}], "broader": [{"uri": "http://x/a/1.1"}]}
# comment lines and blank lines are ignored

{"uri": "http://x/a/2", "inScheme": [{"uri": "http://x/a/"}]}
{not json
"#;

    fn parsed() -> FileItems {
        FileItems::parse("test", ITEMS)
    }

    #[test]
    fn test_parse_splits_schemes_and_concepts() {
        let items = parsed();
        assert_eq!(items.schemes.len(), 1);
        assert_eq!(items.schemes[0].uri, "http://x/a");
        assert_eq!(items.concepts.len(), 4);
        assert!(items.concept("http://x/a/1.1").is_some());
    }

    #[test]
    fn test_narrower() {
        let uris: Vec<String> = parsed()
            .narrower("http://x/a/1")
            .into_iter()
            .map(|c| c.uri)
            .collect();
        assert_eq!(uris, vec!["http://x/a/1.1"]);
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let uris: Vec<String> = parsed()
            .ancestors("http://x/a/1.1.1")
            .into_iter()
            .map(|c| c.uri)
            .collect();
        assert_eq!(uris, vec!["http://x/a/1.1", "http://x/a/1"]);
    }

    #[test]
    fn test_ancestors_stops_on_cycle() {
        let items = FileItems::parse(
            "test",
            concat!(
                r#"{"uri": "c1", "broader": [{"uri": "c2"}]}"#,
                "\n",
                r#"{"uri": "c2", "broader": [{"uri": "c1"}]}"#,
            ),
        );
        let uris: Vec<String> = items.ancestors("c1").into_iter().map(|c| c.uri).collect();
        assert_eq!(uris, vec!["c2"]);
    }

    #[test]
    fn test_top_uses_top_concept_of_and_root_members() {
        let uris: Vec<String> = parsed()
            .top("http://x/a")
            .into_iter()
            .map(|c| c.uri)
            .collect();
        assert_eq!(uris, vec!["http://x/a/1", "http://x/a/2"]);
    }

    #[tokio::test]
    async fn test_list_schemes_rereads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.ndjson");
        tokio::fs::write(&path, ITEMS).await.unwrap();

        let registry = FileRegistry::new(&path);
        assert_eq!(registry.list_schemes(100).await.unwrap().len(), 1);

        let mut more = ITEMS.to_string();
        more.push_str(
            r#"{"uri": "http://x/b", "type": ["http://www.w3.org/2004/02/skos/core#ConceptScheme"]}"#,
        );
        tokio::fs::write(&path, more).await.unwrap();
        assert_eq!(registry.list_schemes(100).await.unwrap().len(), 2);
        assert_eq!(registry.list_schemes(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_concept_fills_requested_relations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.ndjson");
        tokio::fs::write(&path, ITEMS).await.unwrap();

        let registry = FileRegistry::new(&path);
        let concept = registry
            .get_concept("http://x/a/1.1", &["narrower", "ancestors"])
            .await
            .unwrap()
            .unwrap();
        let narrower: Vec<&str> = member_uris(&concept.narrower).collect();
        let ancestors: Vec<&str> = member_uris(&concept.ancestors).collect();
        assert_eq!(narrower, vec!["http://x/a/1.1.1"]);
        assert_eq!(ancestors, vec!["http://x/a/1"]);

        assert!(registry.get_concept("http://x/a/9", &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let registry = FileRegistry::new("/nonexistent/items.ndjson");
        let err = registry.list_schemes(10).await.unwrap_err();
        assert!(matches!(err, jskos_core::Error::Io(_)));
    }
}
