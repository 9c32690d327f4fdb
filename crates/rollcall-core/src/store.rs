//! Persistent identity store boundary.

use crate::types::PersonRecord;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached. Mutations abort; the stale cache
    /// snapshot stays in place and the caller may retry.
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
    #[error("person not found: {0}")]
    NotFound(String),
}

/// Durable table of enrolled persons keyed by `person_id`.
///
/// `upsert` has last-write-wins semantics; re-enrollment replaces the stored
/// embedding outright. Concurrent mutations of the same person serialize
/// through the store, which is why cache refresh re-derives wholesale from
/// `load_enabled` instead of patching the in-memory state.
pub trait IdentityStore {
    /// All enabled persons, for cache (re)builds.
    fn load_enabled(&self) -> Result<Vec<PersonRecord>, StoreError>;

    /// One person by id, enabled or not. `Ok(None)` when absent.
    fn fetch(&self, person_id: &str) -> Result<Option<PersonRecord>, StoreError>;

    fn upsert(&self, record: &PersonRecord) -> Result<(), StoreError>;

    /// Remove a person. `NotFound` when the id was never enrolled.
    fn delete(&self, person_id: &str) -> Result<(), StoreError>;

    /// Toggle participation in matching without dropping the training data.
    fn set_enabled(&self, person_id: &str, enabled: bool) -> Result<(), StoreError>;
}
