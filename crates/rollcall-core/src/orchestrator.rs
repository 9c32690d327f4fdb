//! Recognition orchestrator and enrollment aggregator.
//!
//! Owns the store adapter, the face codec and the identity cache, and drives
//! the per-call state machine: Detect -> (per face) Embed -> Match ->
//! Aggregate. Mutations write through the store first and only then swap the
//! cache snapshot, so a recognition request never observes state that is not
//! durably committed.

use crate::aggregate::aggregate_mean;
use crate::cache::IdentityCache;
use crate::codec::{CodecError, FaceCodec};
use crate::matcher::{CosineMatcher, Matcher};
use crate::store::{IdentityStore, StoreError};
use crate::types::{BoundingBox, Classification, Embedding, Frame, MatchResult, PersonRecord};
use chrono::Utc;
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    /// Zero images in the batch yielded a usable face. Nothing was written.
    #[error("no usable face in any of the {supplied} enrollment images")]
    NoUsableImage { supplied: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum RecognizeError {
    /// Detection failed for the whole group photo; the call is aborted.
    #[error("group photo unprocessable: {0}")]
    ImageUnprocessable(String),
}

/// Outcome of an enrollment batch. `images_used < images_supplied` signals
/// partial success: some images were dropped as face-free.
#[derive(Debug, Clone, Serialize)]
pub struct TrainOutcome {
    pub person_id: String,
    pub images_supplied: usize,
    pub images_used: usize,
    #[serde(skip)]
    pub embedding: Embedding,
}

/// One detected face in a group photo with its classification.
#[derive(Debug, Clone, Serialize)]
pub struct DetectedFace {
    pub bounding_box: BoundingBox,
    #[serde(flatten)]
    pub result: MatchResult,
}

/// Aggregate result of one recognition call. The counts are derived from the
/// face list and always satisfy `identified + unidentified == total`.
#[derive(Debug, Serialize)]
pub struct RecognitionReport {
    pub faces: Vec<DetectedFace>,
    pub total_detected: usize,
    pub identified_count: usize,
    pub unidentified_count: usize,
    #[serde(serialize_with = "serialize_millis", rename = "processing_time_ms")]
    pub processing_time: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Identity matching engine: enrollment, recognition and cache upkeep.
pub struct Orchestrator<S, C> {
    store: S,
    codec: C,
    cache: IdentityCache,
    matcher: CosineMatcher,
    default_threshold: f32,
}

impl<S: IdentityStore, C: FaceCodec> Orchestrator<S, C> {
    /// Build the orchestrator and load the cache from the store.
    /// Fails fast if the store is unreachable — startup wants a known-good
    /// enrolled set, not a silently empty one.
    pub fn bootstrap(store: S, codec: C, default_threshold: f32) -> Result<Self, StoreError> {
        let cache = IdentityCache::bootstrap(&store)?;
        tracing::info!(
            enrolled = cache.snapshot().len(),
            threshold = default_threshold,
            "identity cache loaded"
        );
        Ok(Self {
            store,
            codec,
            cache,
            matcher: CosineMatcher,
            default_threshold,
        })
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub fn default_threshold(&self) -> f32 {
        self.default_threshold
    }

    /// Enroll (or re-enroll) a person from a batch of photos.
    ///
    /// Images yielding no usable face are dropped, not fatal; the embeddings
    /// of the rest are folded into a single mean reference vector. The store
    /// write commits before the cache swap. Re-enrollment replaces the prior
    /// embedding outright — last write wins, no cross-session blending.
    pub fn train(
        &mut self,
        person_id: &str,
        display_name: &str,
        metadata: serde_json::Value,
        images: &[Frame],
    ) -> Result<TrainOutcome, TrainError> {
        let mut embeddings = Vec::with_capacity(images.len());

        for (i, frame) in images.iter().enumerate() {
            match self.embed_best_face(frame) {
                Ok(e) => embeddings.push(e),
                Err(err) => {
                    tracing::warn!(
                        person_id,
                        image = i + 1,
                        error = %err,
                        "enrollment image dropped"
                    );
                }
            }
        }

        let Some(embedding) = aggregate_mean(&embeddings) else {
            return Err(TrainError::NoUsableImage {
                supplied: images.len(),
            });
        };

        let record = PersonRecord {
            person_id: person_id.to_string(),
            display_name: display_name.to_string(),
            embedding: Some(embedding.clone()),
            training_image_count: embeddings.len() as u32,
            enabled: true,
            last_trained_at: Some(Utc::now()),
            metadata,
        };
        self.store.upsert(&record)?;
        self.cache.refresh(&self.store)?;

        tracing::info!(
            person_id,
            images_used = embeddings.len(),
            images_supplied = images.len(),
            "person trained"
        );

        Ok(TrainOutcome {
            person_id: person_id.to_string(),
            images_supplied: images.len(),
            images_used: embeddings.len(),
            embedding,
        })
    }

    /// Classify every face in a group photo against the enrolled set.
    ///
    /// The cache snapshot is captured once up front; concurrent mutations
    /// never affect a call in flight. A face that fails to embed degrades to
    /// unknown rather than aborting the call — partial results beat none for
    /// a group photo.
    pub fn recognize(
        &mut self,
        frame: &Frame,
        threshold_override: Option<f32>,
    ) -> Result<RecognitionReport, RecognizeError> {
        let started = Instant::now();
        let threshold = threshold_override.unwrap_or(self.default_threshold);
        let snapshot = self.cache.snapshot();

        let boxes = self
            .codec
            .detect(frame)
            .map_err(|e| RecognizeError::ImageUnprocessable(e.to_string()))?;

        let mut faces = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let result = match self.codec.embed(frame, &bbox) {
                Ok(embedding) => self.matcher.best_match(&embedding, &snapshot, threshold),
                Err(err) => {
                    tracing::debug!(error = %err, "face degraded to unknown: embed failed");
                    MatchResult::unknown(0.0)
                }
            };
            faces.push(DetectedFace {
                bounding_box: bbox,
                result,
            });
        }

        let total_detected = faces.len();
        let identified_count = faces
            .iter()
            .filter(|f| f.result.classification == Classification::Identified)
            .count();

        let report = RecognitionReport {
            total_detected,
            identified_count,
            unidentified_count: total_detected - identified_count,
            faces,
            processing_time: started.elapsed(),
        };

        tracing::info!(
            total = report.total_detected,
            identified = report.identified_count,
            unidentified = report.unidentified_count,
            elapsed_ms = report.processing_time.as_millis() as u64,
            "group photo processed"
        );

        Ok(report)
    }

    /// Delete a person's enrollment; refreshes the cache on success.
    pub fn remove(&mut self, person_id: &str) -> Result<(), StoreError> {
        self.store.delete(person_id)?;
        self.cache.refresh(&self.store)?;
        tracing::info!(person_id, "person removed");
        Ok(())
    }

    /// Enable or disable a person for matching; refreshes the cache.
    pub fn set_enabled(&mut self, person_id: &str, enabled: bool) -> Result<(), StoreError> {
        self.store.set_enabled(person_id, enabled)?;
        self.cache.refresh(&self.store)?;
        tracing::info!(person_id, enabled, "person matching toggled");
        Ok(())
    }

    /// Training status straight from the store (includes disabled persons).
    pub fn training_status(&self, person_id: &str) -> Result<Option<PersonRecord>, StoreError> {
        self.store.fetch(person_id)
    }

    /// Enrolled persons currently matchable, from the live snapshot.
    pub fn list_enrolled(&self) -> Vec<(String, String)> {
        self.cache
            .snapshot()
            .entries()
            .iter()
            .map(|e| (e.person_id.clone(), e.display_name.clone()))
            .collect()
    }

    /// Highest-confidence face in an enrollment image, embedded.
    fn embed_best_face(&mut self, frame: &Frame) -> Result<Embedding, CodecError> {
        let boxes = self.codec.detect(frame)?;
        let best = boxes.first().ok_or(CodecError::NoFaceDetected)?;
        self.codec.embed(frame, best)
    }
}
