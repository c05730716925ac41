//! Registry bindings: a client plus the policy and priority it was
//! configured with.
//!
//! The policy lives next to the client instead of on it, so the same client
//! type serves registries with different inclusion rules. Clients that lose
//! their upstream connection re-initialize themselves on the next call
//! (see `ConceptApiClient`), so a binding is created once at startup.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use jskos_core::{defaults, Error, RegistryClient, Result};

use crate::config::BackendConfig;

/// One configured upstream registry.
pub struct RegistryBinding {
    pub client: Arc<dyn RegistryClient>,
    /// Whether schemes from this registry must expose concepts to be listed.
    pub require_concepts: bool,
    /// Position in the configuration; lower wins on conflicts.
    pub priority: usize,
}

impl RegistryBinding {
    pub fn new(client: Arc<dyn RegistryClient>, require_concepts: bool, priority: usize) -> Self {
        Self {
            client,
            require_concepts,
            priority,
        }
    }

    /// Bind every configured base, in configuration order.
    pub fn bind_all(config: &BackendConfig) -> Result<Vec<Arc<RegistryBinding>>> {
        config
            .backends
            .iter()
            .enumerate()
            .map(|(priority, base)| {
                let client = jskos_registry::connect(base, config.registry_timeout)?;
                let require_concepts = config.require_concepts_for(base);
                info!(registry = %base, priority, require_concepts, "Bound registry");
                Ok(Arc::new(RegistryBinding::new(client, require_concepts, priority)))
            })
            .collect()
    }

    /// Base URL or path of the registry.
    pub fn base(&self) -> &str {
        self.client.base()
    }

    /// Run an upstream call, turning an elapsed `timeout` into
    /// [`Error::Upstream`]. Calls slower than
    /// [`defaults::SLOW_CALL_MS`] are logged.
    pub async fn bounded<T>(
        &self,
        timeout: Duration,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let start = Instant::now();
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                if duration_ms > defaults::SLOW_CALL_MS {
                    warn!(
                        registry = %self.base(),
                        duration_ms,
                        slow = true,
                        "Slow registry call"
                    );
                }
                result
            }
            Err(_) => Err(Error::Upstream(format!(
                "{} did not answer within {}ms",
                self.base(),
                timeout.as_millis()
            ))),
        }
    }
}

impl fmt::Debug for RegistryBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBinding")
            .field("base", &self.base())
            .field("require_concepts", &self.require_concepts)
            .field("priority", &self.priority)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jskos_registry::MockRegistry;

    #[test]
    fn test_bind_all_resolves_policy_per_base() {
        let config = BackendConfig::default()
            .with_backends(["https://a.example/api/", "items.ndjson"])
            .with_require_concepts(true)
            .with_require_concepts_override("items.ndjson", false);

        let bindings = RegistryBinding::bind_all(&config).unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].base(), "https://a.example/api/");
        assert!(bindings[0].require_concepts);
        assert_eq!(bindings[0].priority, 0);
        assert_eq!(bindings[1].base(), "items.ndjson");
        assert!(!bindings[1].require_concepts);
        assert_eq!(bindings[1].priority, 1);
    }

    #[test]
    fn test_debug_shows_base() {
        let binding = RegistryBinding::new(Arc::new(MockRegistry::new("mock://a")), true, 0);
        let debug = format!("{:?}", binding);
        assert!(debug.contains("mock://a"));
        assert!(debug.contains("require_concepts: true"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out_as_upstream_error() {
        let registry = MockRegistry::new("mock://slow").with_delay(Duration::from_secs(60));
        let binding = RegistryBinding::new(Arc::new(registry.clone()), true, 0);

        let err = binding
            .bounded(Duration::from_secs(1), registry.list_schemes(10))
            .await
            .unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("mock://slow"));
    }
}
