//! JSKOS Concept API client.
//!
//! Endpoint URLs are discovered from the registry's `status` resource on
//! first use. Until discovery succeeds the client is uninitialized and every
//! call retries it, so a registry that was down at startup is picked up as
//! soon as it comes back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use jskos_core::defaults::SLOW_CALL_MS;
use jskos_core::{Concept, ConceptScheme, Error, RegistryClient, Result};

/// Resolved endpoint URLs of a Concept API instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub schemes: String,
    pub top: String,
    pub data: String,
    pub narrower: String,
    pub ancestors: String,
}

impl Endpoints {
    /// Conventional endpoint layout below `base` (which ends with `/`).
    pub fn defaults(base: &str) -> Self {
        Self {
            schemes: format!("{base}voc"),
            top: format!("{base}voc/top"),
            data: format!("{base}data"),
            narrower: format!("{base}narrower"),
            ancestors: format!("{base}ancestors"),
        }
    }

    /// Endpoints announced in a status document, with defaults for any
    /// endpoint the document does not list as a string.
    pub fn from_status(base: &str, status: &Value) -> Self {
        let defaults = Self::defaults(base);
        let pick = |key: &str, fallback: String| {
            status
                .get(key)
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or(fallback)
        };
        Self {
            schemes: pick("schemes", defaults.schemes),
            top: pick("top", defaults.top),
            data: pick("data", defaults.data),
            narrower: pick("narrower", defaults.narrower),
            ancestors: pick("ancestors", defaults.ancestors),
        }
    }
}

/// Client for one Concept API registry.
pub struct ConceptApiClient {
    client: Client,
    base: String,
    endpoints: RwLock<Option<Arc<Endpoints>>>,
}

impl ConceptApiClient {
    /// Create a client for `base`. A missing trailing slash is added.
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("jskos-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };

        info!(registry = %base, timeout_secs = timeout.as_secs(), "Initializing Concept API client");

        Ok(Self {
            client,
            base,
            endpoints: RwLock::new(None),
        })
    }

    /// Whether endpoint discovery has succeeded.
    pub async fn is_initialized(&self) -> bool {
        self.endpoints.read().await.is_some()
    }

    /// Discovered endpoints, running discovery if needed.
    pub async fn endpoints(&self) -> Result<Arc<Endpoints>> {
        if let Some(endpoints) = self.endpoints.read().await.as_ref() {
            return Ok(endpoints.clone());
        }

        let mut slot = self.endpoints.write().await;
        if let Some(endpoints) = slot.as_ref() {
            return Ok(endpoints.clone());
        }

        let url = format!("{}status", self.base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("{}: status request failed: {}", url, e)))?;

        let endpoints = match response.status() {
            status if status.is_success() => {
                let doc: Value = response.json().await.map_err(|e| {
                    Error::Upstream(format!("{}: failed to parse status: {}", url, e))
                })?;
                Endpoints::from_status(&self.base, &doc)
            }
            StatusCode::NOT_FOUND => {
                debug!(registry = %self.base, "No status resource, using default endpoints");
                Endpoints::defaults(&self.base)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Upstream(format!("{} returned {}: {}", url, status, body)));
            }
        };

        debug!(registry = %self.base, ?endpoints, "Discovered registry endpoints");
        let endpoints = Arc::new(endpoints);
        *slot = Some(endpoints.clone());
        Ok(endpoints)
    }

    /// GET a JSON array and return its elements.
    async fn get_list(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<Value>> {
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("{}: request failed: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("{} returned {}: {}", url, status, body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("{}: failed to parse response: {}", url, e)))?;

        let elapsed = start.elapsed().as_millis() as u64;
        if elapsed > SLOW_CALL_MS {
            warn!(registry = %self.base, url, duration_ms = elapsed, slow = true, "Slow registry call");
        }

        match body {
            Value::Array(items) => Ok(items),
            other => Err(Error::Upstream(format!(
                "{}: expected JSON array, got {}",
                url,
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decode list members, dropping (and logging) the ones that do not fit.
fn decode_all<T: DeserializeOwned>(registry: &str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(registry, error = %e, "Skipping malformed item");
                None
            }
        })
        .collect()
}

#[async_trait]
impl RegistryClient for ConceptApiClient {
    fn base(&self) -> &str {
        &self.base
    }

    #[instrument(skip(self), fields(subsystem = "registry", component = "concept_api", op = "list_schemes", registry = %self.base))]
    async fn list_schemes(&self, limit: usize) -> Result<Vec<ConceptScheme>> {
        let endpoints = self.endpoints().await?;
        let limit = limit.to_string();
        let items = self
            .get_list(&endpoints.schemes, &[("limit", limit.as_str())])
            .await?;
        let schemes: Vec<ConceptScheme> = decode_all(&self.base, items);
        debug!(scheme_count = schemes.len(), "Listed schemes");
        Ok(schemes)
    }

    #[instrument(skip(self, properties), fields(subsystem = "registry", component = "concept_api", op = "get_concept", registry = %self.base))]
    async fn get_concept(&self, uri: &str, properties: &[&str]) -> Result<Option<Concept>> {
        let endpoints = self.endpoints().await?;
        let properties = properties.join(",");
        let mut query = vec![("uri", uri)];
        if !properties.is_empty() {
            query.push(("properties", properties.as_str()));
        }
        let items = self.get_list(&endpoints.data, &query).await?;
        Ok(decode_all::<Concept>(&self.base, items).into_iter().next())
    }

    #[instrument(skip(self), fields(subsystem = "registry", component = "concept_api", op = "get_top", registry = %self.base))]
    async fn get_top(&self, scheme_uri: &str) -> Result<Vec<Concept>> {
        let endpoints = self.endpoints().await?;
        let items = self.get_list(&endpoints.top, &[("uri", scheme_uri)]).await?;
        Ok(decode_all(&self.base, items))
    }

    #[instrument(skip(self), fields(subsystem = "registry", component = "concept_api", op = "get_narrower", registry = %self.base))]
    async fn get_narrower(&self, concept_uri: &str) -> Result<Vec<Concept>> {
        let endpoints = self.endpoints().await?;
        let items = self
            .get_list(&endpoints.narrower, &[("uri", concept_uri)])
            .await?;
        Ok(decode_all(&self.base, items))
    }

    #[instrument(skip(self), fields(subsystem = "registry", component = "concept_api", op = "get_ancestors", registry = %self.base))]
    async fn get_ancestors(&self, concept_uri: &str) -> Result<Vec<Concept>> {
        let endpoints = self.endpoints().await?;
        let items = self
            .get_list(&endpoints.ancestors, &[("uri", concept_uri)])
            .await?;
        Ok(decode_all(&self.base, items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_endpoints() {
        let endpoints = Endpoints::defaults("https://api.example.org/");
        assert_eq!(endpoints.schemes, "https://api.example.org/voc");
        assert_eq!(endpoints.top, "https://api.example.org/voc/top");
        assert_eq!(endpoints.data, "https://api.example.org/data");
    }

    #[test]
    fn test_endpoints_from_status_with_fallback() {
        let status = json!({
            "ok": 1,
            "schemes": "https://other.example.org/schemes",
            "top": null,
            "data": "https://other.example.org/data"
        });
        let endpoints = Endpoints::from_status("https://api.example.org/", &status);
        assert_eq!(endpoints.schemes, "https://other.example.org/schemes");
        assert_eq!(endpoints.top, "https://api.example.org/voc/top");
        assert_eq!(endpoints.data, "https://other.example.org/data");
        assert_eq!(endpoints.ancestors, "https://api.example.org/ancestors");
    }

    #[test]
    fn test_new_adds_trailing_slash() {
        let client = ConceptApiClient::new("https://api.example.org", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base(), "https://api.example.org/");
    }

    #[test]
    fn test_decode_all_skips_malformed() {
        let items = vec![json!({"uri": "http://x/a"}), json!({"notation": ["no uri"]}), json!(42)];
        let schemes: Vec<ConceptScheme> = decode_all("test", items);
        assert_eq!(schemes.len(), 1);
        assert_eq!(schemes[0].uri, "http://x/a");
    }

    #[test]
    fn test_json_kind() {
        assert_eq!(json_kind(&json!({})), "object");
        assert_eq!(json_kind(&json!(null)), "null");
    }
}
