//! Face codec capability boundary.
//!
//! The matching and caching core never runs inference itself; it invokes a
//! detector/embedder through this trait so it can be exercised with synthetic
//! vectors in tests while the daemon plugs in the ONNX-backed implementation.

use crate::types::{BoundingBox, Embedding, Frame};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    /// The given face region yielded no usable face for embedding.
    #[error("no face detected in region")]
    NoFaceDetected,
    /// The image itself could not be processed (malformed, wrong geometry).
    #[error("image unprocessable: {0}")]
    Unprocessable(String),
    /// The underlying inference runtime failed.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Detection + embedding capability.
pub trait FaceCodec {
    /// Detect faces in a frame, returning bounding boxes sorted by
    /// descending confidence. A face-free image is `Ok(vec![])`, not an error.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, CodecError>;

    /// Extract an identity embedding for one detected face.
    fn embed(&mut self, frame: &Frame, face: &BoundingBox) -> Result<Embedding, CodecError>;
}
