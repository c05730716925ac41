//! # jskos-backend
//!
//! The resolution layer of jskos-proxy.
//!
//! Several upstream registries are merged into one [`SchemeIndex`] that a
//! [`RefreshLoop`] rebuilds on a fixed interval. The [`Backend`] facade
//! answers scheme lookups from the index and forwards concept lookups to
//! the registry that owns the concept's scheme.
//!
//! ## Example
//!
//! ```rust,ignore
//! use jskos_backend::{Backend, BackendConfig, LookupRequest};
//!
//! let backend = Backend::from_config(BackendConfig::from_env()?)?;
//! backend.start().await?;
//!
//! let schemes = backend.get_schemes().await?;
//! let concept = backend
//!     .resolve(&LookupRequest::new(Some("ddc"), Some("612"), None))
//!     .await?;
//!
//! backend.stop().await?;
//! ```

pub mod binding;
pub mod config;
pub mod facade;
pub mod index;
pub mod merge;
pub mod refresh;
pub mod resolver;

pub use binding::RegistryBinding;
pub use config::BackendConfig;
pub use facade::{Backend, Resolved};
pub use index::{SchemeIndex, Snapshot};
pub use merge::{merge, IndexedScheme};
pub use refresh::{CycleReport, RefreshConfig, RefreshEvent, RefreshHandle, RefreshLoop};
pub use resolver::{classify, scheme_uri, LookupRequest, Target};

// Re-export core types for convenience
pub use jskos_core::{Concept, ConceptScheme, Error, Result};
