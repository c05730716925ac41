//! The scheme index: immutable snapshots swapped in whole.
//!
//! Readers take an `Arc<Snapshot>` and keep seeing that snapshot for as
//! long as they hold it; the refresh loop replaces the current snapshot in
//! one step through a `tokio::sync::watch` channel. Callers arriving
//! before the first publish wait on the same channel and are all released
//! by that publish.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, Serializer};
use tokio::sync::watch;

use jskos_core::uri::{normalize, remainder_after, rebase};
use jskos_core::{ConceptScheme, Error, Result};

use crate::merge::IndexedScheme;

/// One published, merged scheme list.
#[derive(Debug)]
pub struct Snapshot {
    schemes: Vec<IndexedScheme>,
    published_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(schemes: Vec<IndexedScheme>) -> Self {
        Self {
            schemes,
            published_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    /// Entries in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexedScheme> {
        self.schemes.iter()
    }

    /// The scheme records in priority order.
    pub fn schemes(&self) -> impl Iterator<Item = &ConceptScheme> {
        self.schemes.iter().map(|entry| &entry.scheme)
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    /// Look up a scheme by URI or alias.
    ///
    /// Tries an exact `uri` match, then a match ignoring trailing slashes,
    /// then the `identifier` aliases (also ignoring trailing slashes).
    /// The first hit in priority order wins.
    pub fn find(&self, uri_or_alias: &str) -> Option<&IndexedScheme> {
        let wanted = normalize(uri_or_alias);
        self.schemes
            .iter()
            .find(|entry| entry.uri() == uri_or_alias)
            .or_else(|| self.schemes.iter().find(|entry| normalize(entry.uri()) == wanted))
            .or_else(|| {
                self.schemes.iter().find(|entry| {
                    entry
                        .scheme
                        .identifier
                        .iter()
                        .any(|alias| normalize(alias) == wanted)
                })
            })
    }

    /// The scheme a concept URI belongs to, and the URI to request from
    /// its registry.
    ///
    /// The longest prefix wins among canonical URIs, identifier aliases and
    /// `namespace` values. A concept addressed through an alias is rebased
    /// onto the canonical scheme URI. Without any prefix match the first
    /// scheme whose `uriPattern` matches the whole URI is used.
    pub fn owner_of(&self, concept_uri: &str) -> Option<(&IndexedScheme, String)> {
        let mut best: Option<(usize, &IndexedScheme, String)> = None;

        for entry in &self.schemes {
            let mut consider = |len: usize, uri: String| {
                if best.as_ref().map_or(true, |(best_len, _, _)| len > *best_len) {
                    best = Some((len, entry, uri));
                }
            };

            if remainder_after(concept_uri, entry.uri()).is_some() {
                consider(normalize(entry.uri()).len(), concept_uri.to_string());
            }
            for alias in &entry.scheme.identifier {
                if let Some(canonical) = rebase(concept_uri, alias, entry.uri()) {
                    consider(normalize(alias).len(), canonical);
                }
            }
            if let Some(namespace) = entry.scheme.namespace.as_deref() {
                if !namespace.is_empty() && concept_uri.starts_with(namespace) {
                    consider(namespace.len(), concept_uri.to_string());
                }
            }
        }

        if let Some((_, entry, uri)) = best {
            return Some((entry, uri));
        }

        self.schemes
            .iter()
            .find(|entry| entry.matches_pattern(concept_uri))
            .map(|entry| (entry, concept_uri.to_string()))
    }
}

/// Serializes as the plain list of scheme records.
impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.schemes())
    }
}

/// Shared handle to the current snapshot.
///
/// Clones share the same underlying channel.
#[derive(Clone)]
pub struct SchemeIndex {
    tx: Arc<watch::Sender<Option<Arc<Snapshot>>>>,
}

impl Default for SchemeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemeIndex {
    /// Create an index with nothing published yet.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the current snapshot and release anyone waiting for the
    /// first one.
    pub fn publish(&self, schemes: Vec<IndexedScheme>) -> Arc<Snapshot> {
        let snapshot = Arc::new(Snapshot::new(schemes));
        self.tx.send_replace(Some(snapshot.clone()));
        snapshot
    }

    /// The current snapshot, without waiting.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.tx.borrow().clone()
    }

    /// The current snapshot, waiting for the first publish if needed.
    pub async fn all(&self) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }
        let mut rx = self.tx.subscribe();
        let published = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::Internal("Scheme index closed before first publish".into()))?;
        published
            .as_ref()
            .cloned()
            .ok_or_else(|| Error::Internal("Scheme index published nothing".into()))
    }

    /// [`Snapshot::find`] on the current snapshot, waiting for the first
    /// publish if needed. The returned record is a copy.
    pub async fn find(&self, uri_or_alias: &str) -> Result<Option<ConceptScheme>> {
        let snapshot = self.all().await?;
        Ok(snapshot.find(uri_or_alias).map(|entry| entry.scheme.clone()))
    }

    /// Whether at least one snapshot has been published.
    pub fn is_ready(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// When the current snapshot was published.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.tx.borrow().as_ref().map(|snapshot| snapshot.published_at())
    }
}
