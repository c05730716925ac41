//! # jskos-core
//!
//! Core types, traits, and abstractions for jskos-proxy.
//!
//! This crate provides the JSKOS data model, the error taxonomy, the
//! registry client trait, URI helpers, and the output format table that
//! the other jskos-proxy crates depend on.

pub mod defaults;
pub mod error;
pub mod format;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uri;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use format::{negotiate, requested_format, Format};
pub use models::*;
pub use traits::*;
