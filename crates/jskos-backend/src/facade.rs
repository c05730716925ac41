//! The backend facade: the only entry point an outer layer needs.
//!
//! Reads never fail because of refresh problems. They wait for the first
//! published snapshot, then answer from whatever snapshot is current.
//! Absence is `Ok(None)`; a failed concept fetch is [`Error::Upstream`].

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, instrument};

use jskos_core::uri::normalize;
use jskos_core::{defaults, Concept, ConceptScheme, Error, Result};

use crate::binding::RegistryBinding;
use crate::config::BackendConfig;
use crate::index::{SchemeIndex, Snapshot};
use crate::merge::IndexedScheme;
use crate::refresh::{RefreshConfig, RefreshEvent, RefreshHandle, RefreshLoop};
use crate::resolver::{classify, LookupRequest, Target};

/// Result of [`Backend::resolve`].
#[derive(Debug, Clone)]
pub enum Resolved {
    Schemes(Arc<Snapshot>),
    Scheme(ConceptScheme),
    Concept(Concept),
}

impl Resolved {
    pub fn to_json(&self) -> Result<Value> {
        Ok(match self {
            Resolved::Schemes(snapshot) => serde_json::to_value(snapshot.as_ref())?,
            Resolved::Scheme(scheme) => serde_json::to_value(scheme)?,
            Resolved::Concept(concept) => serde_json::to_value(concept)?,
        })
    }
}

/// Scheme index, registry bindings and the refresh loop, behind one API.
pub struct Backend {
    index: SchemeIndex,
    bindings: Vec<Arc<RegistryBinding>>,
    config: BackendConfig,
    refresh: Mutex<Option<RefreshHandle>>,
}

impl Backend {
    /// Validate `config` and bind its registries.
    pub fn from_config(config: BackendConfig) -> Result<Self> {
        config.validate()?;
        let bindings = RegistryBinding::bind_all(&config)?;
        Ok(Self::new(config, bindings))
    }

    /// Create a backend over already bound registries, in priority order.
    pub fn new(config: BackendConfig, bindings: Vec<Arc<RegistryBinding>>) -> Self {
        Self {
            index: SchemeIndex::new(),
            bindings,
            config,
            refresh: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn index(&self) -> &SchemeIndex {
        &self.index
    }

    pub fn bindings(&self) -> &[Arc<RegistryBinding>] {
        &self.bindings
    }

    /// Start the refresh loop. The returned receiver sees every event from
    /// the first cycle on.
    ///
    /// Fails with [`Error::Config`] if the configuration cannot drive the
    /// loop, before anything is spawned.
    pub async fn start(&self) -> Result<broadcast::Receiver<RefreshEvent>> {
        let mut refresh = self.refresh.lock().await;
        if refresh.is_some() {
            return Err(Error::Internal("Backend already started".into()));
        }
        self.config.validate()?;

        let refresh_loop = RefreshLoop::new(
            self.bindings.clone(),
            self.index.clone(),
            RefreshConfig::from(&self.config),
        );
        let events = refresh_loop.events();
        *refresh = Some(refresh_loop.start()?);

        info!(
            namespace = %self.config.namespace,
            registries = self.bindings.len(),
            listing = self.config.listing,
            "Backend started"
        );
        Ok(events)
    }

    /// Stop the refresh loop. The last snapshot stays readable.
    pub async fn stop(&self) -> Result<()> {
        let handle = self.refresh.lock().await.take();
        if let Some(handle) = handle {
            handle.shutdown().await?;
            info!("Backend stopped");
        }
        Ok(())
    }

    /// Wait for the outcome of the first refresh cycle.
    ///
    /// `events` is the receiver returned by [`Backend::start`]. Returns the
    /// current snapshot once one is published, or
    /// [`Error::RefreshFailed`] if the first cycle published nothing. The
    /// read methods keep waiting through failed cycles; this does not.
    pub async fn ready(
        &self,
        events: &mut broadcast::Receiver<RefreshEvent>,
    ) -> Result<Arc<Snapshot>> {
        loop {
            if let Some(snapshot) = self.index.current() {
                return Ok(snapshot);
            }
            match events.recv().await {
                Ok(RefreshEvent::TotalFailure { error }) => {
                    return Err(Error::RefreshFailed(error));
                }
                Ok(RefreshEvent::Stopped) | Err(broadcast::error::RecvError::Closed) => {
                    return Err(Error::Internal(
                        "Refresh loop stopped before publishing".into(),
                    ));
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            }
        }
    }

    /// All schemes, waiting for the first publish if needed.
    ///
    /// Waits indefinitely if the backend was never started.
    pub async fn get_schemes(&self) -> Result<Arc<Snapshot>> {
        self.index.all().await
    }

    /// A scheme by URI or alias.
    pub async fn get_scheme(&self, uri: &str) -> Result<Option<ConceptScheme>> {
        self.index.find(uri).await
    }

    /// A concept, fetched from the registry of its owning scheme.
    pub async fn get_concept(&self, uri: &str) -> Result<Option<Concept>> {
        let snapshot = self.index.all().await?;
        match snapshot.owner_of(uri) {
            Some((owner, canonical)) => self.fetch_concept(owner, &canonical).await,
            None => {
                debug!(uri, "No scheme owns concept");
                Ok(None)
            }
        }
    }

    /// Top concepts of a scheme, empty if the scheme is unknown.
    pub async fn get_top_concepts(&self, scheme_uri: &str) -> Result<Vec<Concept>> {
        let snapshot = self.index.all().await?;
        let Some(entry) = snapshot.find(scheme_uri) else {
            return Ok(Vec::new());
        };
        if !entry.provides_concepts {
            return Ok(Vec::new());
        }
        entry
            .registry
            .bounded(self.config.registry_timeout, entry.registry.client.get_top(entry.uri()))
            .await
    }

    /// Direct narrower concepts, empty if no scheme owns the concept.
    pub async fn get_narrower(&self, concept_uri: &str) -> Result<Vec<Concept>> {
        let snapshot = self.index.all().await?;
        let Some((entry, canonical)) = snapshot.owner_of(concept_uri) else {
            return Ok(Vec::new());
        };
        entry
            .registry
            .bounded(self.config.registry_timeout, entry.registry.client.get_narrower(&canonical))
            .await
    }

    /// Ancestors, nearest first, empty if no scheme owns the concept.
    pub async fn get_ancestors(&self, concept_uri: &str) -> Result<Vec<Concept>> {
        let snapshot = self.index.all().await?;
        let Some((entry, canonical)) = snapshot.owner_of(concept_uri) else {
            return Ok(Vec::new());
        };
        entry
            .registry
            .bounded(self.config.registry_timeout, entry.registry.client.get_ancestors(&canonical))
            .await
    }

    /// Classify a lookup and answer it.
    pub async fn resolve(&self, request: &LookupRequest) -> Result<Option<Resolved>> {
        let target = classify(&self.config.namespace, self.config.listing, request)?;
        debug!(?target, "Resolving lookup");

        match target {
            Target::Schemes => Ok(Some(Resolved::Schemes(self.get_schemes().await?))),
            Target::Scheme(uri) => Ok(self.get_scheme(&uri).await?.map(Resolved::Scheme)),
            Target::SchemeConcept { scheme, local } => {
                let snapshot = self.index.all().await?;
                let concept = match snapshot.find(&scheme) {
                    Some(entry) => {
                        let uri = format!("{}/{}", normalize(entry.uri()), local);
                        self.fetch_concept(entry, &uri).await?
                    }
                    None => {
                        let uri = format!("{}/{}", normalize(&scheme), local);
                        self.get_concept(&uri).await?
                    }
                };
                Ok(concept.map(Resolved::Concept))
            }
            Target::Concept(uri) => Ok(self.get_concept(&uri).await?.map(Resolved::Concept)),
            Target::Item(uri) => {
                if let Some(scheme) = self.get_scheme(&uri).await? {
                    return Ok(Some(Resolved::Scheme(scheme)));
                }
                Ok(self.get_concept(&uri).await?.map(Resolved::Concept))
            }
        }
    }

    #[instrument(
        skip(self, owner),
        fields(subsystem = "backend", component = "facade", op = "get_concept", registry = %owner.registry.base())
    )]
    async fn fetch_concept(&self, owner: &IndexedScheme, uri: &str) -> Result<Option<Concept>> {
        if !owner.provides_concepts {
            debug!(scheme = %owner.uri(), "Scheme provides no concepts");
            return Ok(None);
        }
        owner
            .registry
            .bounded(
                self.config.registry_timeout,
                owner.registry.client.get_concept(uri, defaults::CONCEPT_PROPERTIES),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jskos_core::ItemRef;
    use jskos_registry::MockRegistry;

    fn backend_with(registry: &MockRegistry) -> Backend {
        let binding = Arc::new(RegistryBinding::new(Arc::new(registry.clone()), true, 0));
        Backend::new(BackendConfig::default(), vec![binding])
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let empty: [&str; 0] = [];
        let config = BackendConfig::default().with_backends(empty);
        assert!(matches!(Backend::from_config(config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let backend = backend_with(&MockRegistry::new("mock://a"));
        backend.start().await.unwrap();
        assert!(backend.start().await.is_err());
        backend.stop().await.unwrap();
        backend.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_rejects_zero_interval() {
        let registry = MockRegistry::new("mock://a").with_scheme(ConceptScheme::new("http://x/a"));
        let binding = Arc::new(RegistryBinding::new(Arc::new(registry.clone()), false, 0));
        let config = BackendConfig::default().with_refresh_interval(std::time::Duration::ZERO);
        let backend = Backend::new(config, vec![binding]);

        assert!(matches!(backend.start().await, Err(Error::Config(_))));
        assert_eq!(registry.list_calls(), 0);
        // Nothing was spawned, so stopping is a no-op
        backend.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_ready_returns_first_snapshot() {
        let registry = MockRegistry::new("mock://a").with_scheme(ConceptScheme::new("http://x/a"));
        let backend = backend_with(&registry);
        let mut events = backend.start().await.unwrap();

        let snapshot = backend.ready(&mut events).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(Arc::ptr_eq(&snapshot, &backend.get_schemes().await.unwrap()));
        // Already published: answers without another event
        assert!(backend.ready(&mut events).await.is_ok());

        backend.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_ready_fails_when_first_cycle_fails() {
        let registry = MockRegistry::new("mock://a").with_scheme(ConceptScheme::new("http://x/a"));
        registry.set_failing(true);
        let backend = backend_with(&registry);
        let mut events = backend.start().await.unwrap();

        let err = backend.ready(&mut events).await.unwrap_err();
        match err {
            Error::RefreshFailed(msg) => assert!(msg.contains("mock://a")),
            other => panic!("expected refresh failure, got {other:?}"),
        }
        assert!(!backend.index().is_ready());

        backend.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_concept_of_scheme_without_concepts_is_none() {
        let registry = MockRegistry::new("mock://a")
            .with_scheme(ConceptScheme::new("http://x/a"))
            .with_concept(Concept::new("http://x/a/1"));
        let backend = Backend::new(
            BackendConfig::default(),
            vec![Arc::new(RegistryBinding::new(Arc::new(registry.clone()), false, 0))],
        );
        let mut scheme = ConceptScheme::new("http://x/a");
        scheme.concepts = Some(Vec::new());
        backend
            .index()
            .publish(vec![IndexedScheme::new(scheme, backend.bindings()[0].clone())]);

        assert!(backend.get_concept("http://x/a/1").await.unwrap().is_none());
        assert!(registry.concept_requests().is_empty());
    }

    #[test]
    fn test_resolved_to_json() {
        let mut concept = Concept::new("http://x/a/1");
        concept.in_scheme = Some(vec![Some(ItemRef::stub("http://x/a"))]);
        let json = Resolved::Concept(concept).to_json().unwrap();
        assert_eq!(json["uri"], "http://x/a/1");
        assert_eq!(json["inScheme"][0]["uri"], "http://x/a");
    }
}
