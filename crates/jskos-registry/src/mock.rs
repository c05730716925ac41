//! Mock registry for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use jskos_registry::MockRegistry;
//! use jskos_core::{Concept, ConceptScheme};
//!
//! let registry = MockRegistry::new("mock://a")
//!     .with_scheme(ConceptScheme::new("http://x/a"))
//!     .with_concept(Concept::new("http://x/a/1"));
//!
//! registry.set_failing(true); // every call now returns Error::Upstream
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use jskos_core::uri::same_uri;
use jskos_core::{member_uris, Concept, ConceptScheme, Error, RegistryClient, Result};

#[derive(Debug, Default)]
struct MockState {
    schemes: Vec<ConceptScheme>,
    concepts: HashMap<String, Concept>,
    failing: bool,
    delay: Option<Duration>,
    list_calls: usize,
    concept_requests: Vec<String>,
}

/// In-memory registry with switchable failure and latency.
///
/// Clones share state, so a test can keep a handle while the backend owns
/// another.
#[derive(Clone)]
pub struct MockRegistry {
    base: String,
    state: Arc<Mutex<MockState>>,
}

impl MockRegistry {
    /// Create an empty mock registry.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Add a scheme to the listing.
    pub fn with_scheme(self, scheme: ConceptScheme) -> Self {
        self.lock().schemes.push(scheme);
        self
    }

    /// Add a concept.
    pub fn with_concept(self, concept: Concept) -> Self {
        self.lock().concepts.insert(concept.uri.clone(), concept);
        self
    }

    /// Delay every call by `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.lock().delay = Some(delay);
        self
    }

    /// Replace the scheme listing.
    pub fn set_schemes(&self, schemes: Vec<ConceptScheme>) {
        self.lock().schemes = schemes;
    }

    /// Make every call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Number of `list_schemes` calls so far.
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// URIs passed to `get_concept` so far, in call order.
    pub fn concept_requests(&self) -> Vec<String> {
        self.lock().concept_requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply configured latency, then fail if the registry is failing.
    async fn enter(&self) -> Result<()> {
        let delay = self.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.lock().failing {
            return Err(Error::Upstream(format!(
                "mock registry {} unavailable",
                self.base
            )));
        }
        Ok(())
    }

    fn concepts_where(&self, pred: impl Fn(&Concept) -> bool) -> Vec<Concept> {
        let mut found: Vec<Concept> = self
            .lock()
            .concepts
            .values()
            .filter(|c| pred(*c))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.uri.cmp(&b.uri));
        found
    }
}

#[async_trait]
impl RegistryClient for MockRegistry {
    fn base(&self) -> &str {
        &self.base
    }

    async fn list_schemes(&self, limit: usize) -> Result<Vec<ConceptScheme>> {
        self.lock().list_calls += 1;
        self.enter().await?;
        Ok(self.lock().schemes.iter().take(limit).cloned().collect())
    }

    async fn get_concept(&self, uri: &str, _properties: &[&str]) -> Result<Option<Concept>> {
        self.lock().concept_requests.push(uri.to_string());
        self.enter().await?;
        Ok(self.lock().concepts.get(uri).cloned())
    }

    async fn get_top(&self, scheme_uri: &str) -> Result<Vec<Concept>> {
        self.enter().await?;
        Ok(self.concepts_where(|c| {
            member_uris(&c.top_concept_of).any(|s| same_uri(s, scheme_uri))
        }))
    }

    async fn get_narrower(&self, concept_uri: &str) -> Result<Vec<Concept>> {
        self.enter().await?;
        Ok(self.concepts_where(|c| member_uris(&c.broader).any(|b| b == concept_uri)))
    }

    async fn get_ancestors(&self, concept_uri: &str) -> Result<Vec<Concept>> {
        self.enter().await?;
        let mut ancestors = Vec::new();
        let mut current = self.lock().concepts.get(concept_uri).cloned();
        while let Some(concept) = current {
            let parent = member_uris(&concept.broader).next().map(String::from);
            current = parent.and_then(|p| self.lock().concepts.get(&p).cloned());
            if let Some(parent) = &current {
                if ancestors.iter().any(|a: &Concept| a.uri == parent.uri) {
                    break;
                }
                ancestors.push(parent.clone());
            }
        }
        Ok(ancestors)
    }
}
