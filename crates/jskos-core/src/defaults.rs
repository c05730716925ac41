//! Centralized default constants for jskos-proxy.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// NAMESPACE & BACKENDS
// =============================================================================

/// Namespace root used when `NAMESPACE` is not set.
pub const NAMESPACE: &str = "http://example.org/";

/// Registry base used when `BACKEND` is not set.
pub const BACKEND: &str = "test/items.ndjson";

/// Whether the namespace root lists all schemes.
pub const LISTING: bool = true;

/// Default inclusion policy: a scheme must expose concepts to be listed.
pub const REQUIRE_CONCEPTS: bool = true;

// =============================================================================
// REFRESH
// =============================================================================

/// Interval between scheme refresh cycles (seconds).
pub const REFRESH_INTERVAL_SECS: u64 = 60;

/// Upper bound for a single upstream registry call (seconds).
pub const REGISTRY_TIMEOUT_SECS: u64 = 30;

/// `limit` passed to `listSchemes` so large registries are not truncated.
pub const SCHEME_LIMIT: usize = 10_000;

/// Upstream calls slower than this are logged as slow (milliseconds).
pub const SLOW_CALL_MS: u64 = 5_000;

/// Capacity of the refresh event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 64;

// =============================================================================
// CONCEPTS
// =============================================================================

/// Properties requested with every concept fetch.
pub const CONCEPT_PROPERTIES: &[&str] = &["broader", "ancestors", "narrower"];
