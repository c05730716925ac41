//! # jskos-registry
//!
//! Upstream terminology registry clients for jskos-proxy.
//!
//! This crate provides:
//! - [`ConceptApiClient`]: HTTP client for JSKOS Concept API servers
//! - [`FileRegistry`]: registry backed by a newline-delimited JSKOS file
//! - [`connect`]: pick the right client for a configured base
//! - `MockRegistry` (feature `mock`): in-memory registry for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use jskos_registry::connect;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = connect("https://api.dante.gbv.de/", Duration::from_secs(30)).unwrap();
//!     let schemes = registry.list_schemes(10_000).await.unwrap();
//!     println!("{} schemes", schemes.len());
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

pub mod concept_api;
pub mod file;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use jskos_core::*;

pub use concept_api::{ConceptApiClient, Endpoints};
pub use file::FileRegistry;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockRegistry;

/// Whether a configured base points at an HTTP registry.
pub fn is_http_base(base: &str) -> bool {
    base.starts_with("http:") || base.starts_with("https:")
}

/// Create a client for a configured base: HTTP(S) URLs get a
/// [`ConceptApiClient`], anything else is read as a JSKOS file.
pub fn connect(base: &str, timeout: Duration) -> Result<Arc<dyn RegistryClient>> {
    if is_http_base(base) {
        Ok(Arc::new(ConceptApiClient::new(base, timeout)?))
    } else {
        Ok(Arc::new(FileRegistry::new(base)))
    }
}
