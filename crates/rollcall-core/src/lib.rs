//! rollcall-core — identity matching and embedding-cache engine.
//!
//! Aggregates enrollment photos into one reference embedding per person,
//! keeps the enrolled set in an atomically swappable in-memory snapshot, and
//! classifies faces from group photos by thresholded cosine similarity.
//! Detection/embedding and durable storage are capabilities behind the
//! [`codec::FaceCodec`] and [`store::IdentityStore`] traits.

pub mod aggregate;
pub mod cache;
pub mod codec;
pub mod matcher;
pub mod orchestrator;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::{CacheEntry, CacheSnapshot, IdentityCache};
pub use codec::{CodecError, FaceCodec};
pub use matcher::{CosineMatcher, Matcher};
pub use orchestrator::{
    DetectedFace, Orchestrator, RecognitionReport, RecognizeError, TrainError, TrainOutcome,
};
pub use store::{IdentityStore, StoreError};
pub use types::{BoundingBox, Classification, Embedding, Frame, MatchResult, PersonRecord};
