//! Core traits for jskos-proxy abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable registries and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Concept, ConceptScheme};

// =============================================================================
// REGISTRY CLIENT
// =============================================================================

/// Client for one upstream terminology registry.
///
/// Implementations must report failures as `Err`, never as an empty
/// result, so the refresh loop can tell a failing registry from one that
/// has no schemes.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Base URL or path this client talks to.
    fn base(&self) -> &str;

    /// List the concept schemes of the registry, at most `limit`.
    async fn list_schemes(&self, limit: usize) -> Result<Vec<ConceptScheme>>;

    /// Fetch a concept with the given extra properties expanded.
    ///
    /// Returns `Ok(None)` if the registry does not know the URI.
    async fn get_concept(&self, uri: &str, properties: &[&str]) -> Result<Option<Concept>>;

    /// Top concepts of a scheme.
    async fn get_top(&self, scheme_uri: &str) -> Result<Vec<Concept>>;

    /// Direct narrower concepts of a concept.
    async fn get_narrower(&self, concept_uri: &str) -> Result<Vec<Concept>>;

    /// All broader concepts up to the top, nearest first.
    async fn get_ancestors(&self, concept_uri: &str) -> Result<Vec<Concept>>;
}
