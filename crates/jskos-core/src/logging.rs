//! Structured logging schema and field name constants for jskos-proxy.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Every registry failed; the index is going stale |
//! | WARN  | Partial refresh failure, slow upstream call, ignored bad data |
//! | INFO  | Lifecycle events (start, stop, first publish, recovery) |
//! | DEBUG | Per-cycle details, resolution decisions |
//! | TRACE | Per-item iteration (merge decisions) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID for a single lookup.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "registry", "backend", "proxy"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "concept_api", "file", "refresh", "resolver"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "list_schemes", "get_concept", "cycle"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Registry base URL or file path.
pub const REGISTRY: &str = "registry";

/// Scheme or concept URI being looked up.
pub const URI: &str = "uri";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of schemes returned or published.
pub const SCHEME_COUNT: &str = "scheme_count";

/// Number of registries that failed in a cycle.
pub const FAILED_COUNT: &str = "failed_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
