//! In-memory identity cache.
//!
//! Single source of truth for recognition: a person absent from the current
//! snapshot is never matchable even if present in the store. The snapshot is
//! an immutable `Arc`; writers build a full replacement from the store (no
//! lock held during the I/O) and publish it with one atomic pointer swap, so
//! readers in flight keep the snapshot they captured and never observe a
//! half-built state.

use crate::store::{IdentityStore, StoreError};
use crate::types::Embedding;
use std::sync::{Arc, RwLock};

/// One enabled, trained person as seen by the matcher.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub person_id: String,
    pub display_name: String,
    pub embedding: Embedding,
}

/// Immutable point-in-time view of the enrolled set.
///
/// Entries are sorted by `person_id` so matching is deterministic: on an
/// exact similarity tie the lower id wins by construction.
#[derive(Debug, Default)]
pub struct CacheSnapshot {
    entries: Vec<CacheEntry>,
}

impl CacheSnapshot {
    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, person_id: &str) -> bool {
        self.entries
            .binary_search_by(|e| e.person_id.as_str().cmp(person_id))
            .is_ok()
    }
}

/// Process-wide cache of enrolled embeddings.
pub struct IdentityCache {
    current: RwLock<Arc<CacheSnapshot>>,
}

impl IdentityCache {
    /// Cache that has never been loaded: presents an empty mapping, so
    /// recognition degrades to "nobody recognized" instead of erroring.
    pub fn empty() -> Self {
        Self {
            current: RwLock::new(Arc::new(CacheSnapshot::default())),
        }
    }

    /// Build the cache from the store, failing if the store is unreachable.
    /// Used at startup where fail-fast is wanted.
    pub fn bootstrap<S: IdentityStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let cache = Self::empty();
        cache.refresh(store)?;
        Ok(cache)
    }

    /// Capture the current snapshot. Lock is held only for the `Arc` clone.
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Rebuild wholesale from the store and atomically swap it in.
    ///
    /// On store failure the previous snapshot stays published
    /// (stale-but-available over unavailable) and the error is returned to
    /// the mutating caller. Refresh never merges with the prior in-memory
    /// state, so a deleted person cannot be resurrected by a stale entry.
    pub fn refresh<S: IdentityStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Arc<CacheSnapshot>, StoreError> {
        let records = store.load_enabled()?;

        let mut entries: Vec<CacheEntry> = records
            .into_iter()
            .filter_map(|r| {
                let embedding = r.embedding?;
                Some(CacheEntry {
                    person_id: r.person_id,
                    display_name: r.display_name,
                    embedding,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.person_id.cmp(&b.person_id));

        let next = Arc::new(CacheSnapshot { entries });
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = next.clone();

        tracing::debug!(enrolled = next.len(), "identity cache refreshed");
        Ok(next)
    }
}
