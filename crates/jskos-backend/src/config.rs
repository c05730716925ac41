//! Backend configuration.

use std::collections::HashMap;
use std::time::Duration;

use jskos_core::defaults;
use jskos_core::uri::{is_valid_uri, normalize};
use jskos_core::{Error, Result};

/// Configuration for the resolution backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Namespace root URI, always ending with `/`.
    pub namespace: String,
    /// Registry bases in priority order (first wins on conflicts).
    pub backends: Vec<String>,
    /// Whether the namespace root lists all schemes.
    pub listing: bool,
    /// Default inclusion policy for registries without an override.
    pub require_concepts: bool,
    /// Per-base inclusion policy.
    pub require_concepts_overrides: HashMap<String, bool>,
    /// Time between refresh cycles.
    pub refresh_interval: Duration,
    /// Upper bound for each upstream registry call.
    pub registry_timeout: Duration,
    /// `limit` passed when listing schemes.
    pub scheme_limit: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            namespace: defaults::NAMESPACE.to_string(),
            backends: vec![defaults::BACKEND.to_string()],
            listing: defaults::LISTING,
            require_concepts: defaults::REQUIRE_CONCEPTS,
            require_concepts_overrides: HashMap::new(),
            refresh_interval: Duration::from_secs(defaults::REFRESH_INTERVAL_SECS),
            registry_timeout: Duration::from_secs(defaults::REGISTRY_TIMEOUT_SECS),
            scheme_limit: defaults::SCHEME_LIMIT,
        }
    }
}

impl BackendConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `NAMESPACE` | `http://example.org/` | Namespace root URI |
    /// | `BACKEND` | `test/items.ndjson` | Comma-separated registry bases, priority order |
    /// | `LISTING` | `true` | `0`/`false` disables the scheme listing at the root |
    /// | `REQUIRE_CONCEPTS` | `true` | Only list schemes that expose concepts |
    /// | `REQUIRE_CONCEPTS_OVERRIDES` | (none) | JSON object mapping base to bool |
    /// | `REFRESH_INTERVAL_SECS` | `60` | Scheme refresh period |
    /// | `REGISTRY_TIMEOUT_SECS` | `30` | Per-call upstream timeout |
    /// | `SCHEME_LIMIT` | `10000` | Max schemes requested per registry |
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let namespace = std::env::var("NAMESPACE").unwrap_or(defaults.namespace);

        let backends = std::env::var("BACKEND")
            .map(|v| parse_list(&v))
            .unwrap_or(defaults.backends);

        let listing = env_flag("LISTING", defaults.listing);
        let require_concepts = env_flag("REQUIRE_CONCEPTS", defaults.require_concepts);

        let require_concepts_overrides = match std::env::var("REQUIRE_CONCEPTS_OVERRIDES") {
            Ok(json) if !json.trim().is_empty() => serde_json::from_str(&json).map_err(|e| {
                Error::Config(format!("REQUIRE_CONCEPTS_OVERRIDES is not a JSON object of booleans: {}", e))
            })?,
            _ => HashMap::new(),
        };

        let refresh_interval = env_parse::<u64>("REFRESH_INTERVAL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.refresh_interval);

        let registry_timeout = env_parse::<u64>("REGISTRY_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.registry_timeout);

        let scheme_limit = env_parse::<usize>("SCHEME_LIMIT").unwrap_or(defaults.scheme_limit);

        let config = Self {
            namespace: String::new(),
            backends,
            listing,
            require_concepts,
            require_concepts_overrides,
            refresh_interval,
            registry_timeout,
            scheme_limit,
        }
        .with_namespace(namespace);

        config.validate()?;
        Ok(config)
    }

    /// Set the namespace root. A trailing `/` is added if missing.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let mut namespace = namespace.into();
        if !namespace.ends_with('/') {
            namespace.push('/');
        }
        self.namespace = namespace;
        self
    }

    /// Set the registry bases in priority order.
    pub fn with_backends<I, S>(mut self, backends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backends = backends.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable the scheme listing at the namespace root.
    pub fn with_listing(mut self, listing: bool) -> Self {
        self.listing = listing;
        self
    }

    /// Set the default inclusion policy.
    pub fn with_require_concepts(mut self, require: bool) -> Self {
        self.require_concepts = require;
        self
    }

    /// Override the inclusion policy for one base.
    pub fn with_require_concepts_override(mut self, base: impl Into<String>, require: bool) -> Self {
        self.require_concepts_overrides.insert(base.into(), require);
        self
    }

    /// Set the refresh period.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the per-call upstream timeout.
    pub fn with_registry_timeout(mut self, timeout: Duration) -> Self {
        self.registry_timeout = timeout;
        self
    }

    /// Set the scheme listing limit.
    pub fn with_scheme_limit(mut self, limit: usize) -> Self {
        self.scheme_limit = limit;
        self
    }

    /// Inclusion policy for `base`: its override if any (trailing slashes
    /// ignored), else the default.
    pub fn require_concepts_for(&self, base: &str) -> bool {
        self.require_concepts_overrides
            .iter()
            .find(|(key, _)| normalize(key) == normalize(base))
            .map(|(_, require)| *require)
            .unwrap_or(self.require_concepts)
    }

    /// Check the configuration for values the backend cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            return Err(Error::Config("no backend configured".into()));
        }
        if !is_valid_uri(&self.namespace) {
            return Err(Error::Config(format!(
                "namespace {} is not an absolute URI",
                self.namespace
            )));
        }
        if self.refresh_interval.is_zero() {
            return Err(Error::Config("refresh interval must be positive".into()));
        }
        if self.registry_timeout.is_zero() {
            return Err(Error::Config("registry timeout must be positive".into()));
        }
        if self.scheme_limit == 0 {
            return Err(Error::Config("scheme limit must be positive".into()));
        }
        Ok(())
    }
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Boolean env var: `0` and `false` disable, anything else enables.
fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.trim();
            v != "false" && v != "0"
        })
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
