//! rollcall-codec — concrete face codec for the Rollcall attendance engine.
//!
//! Implements `rollcall_core::FaceCodec` with UltraFace detection and ArcFace
//! embedding over ONNX Runtime, plus the image decode/downscale utilities the
//! daemon uses before handing frames to the core.

pub mod detector;
pub mod embedder;
pub mod preprocess;

pub use detector::{DetectorLoadError, FaceDetector};
pub use embedder::{EmbedderLoadError, FaceEmbedder};
pub use preprocess::{decode_image, downscale, to_frame, MAX_IMAGE_DIM};

use rollcall_core::{BoundingBox, CodecError, Embedding, FaceCodec, Frame};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecLoadError {
    #[error(transparent)]
    Detector(#[from] DetectorLoadError),
    #[error(transparent)]
    Embedder(#[from] EmbedderLoadError),
}

/// ONNX-backed detection + embedding, packaged for the core.
pub struct OnnxCodec {
    detector: FaceDetector,
    embedder: FaceEmbedder,
}

impl OnnxCodec {
    pub fn load(detector_path: &str, embedder_path: &str) -> Result<Self, CodecLoadError> {
        Ok(Self {
            detector: FaceDetector::load(detector_path)?,
            embedder: FaceEmbedder::load(embedder_path)?,
        })
    }
}

impl FaceCodec for OnnxCodec {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, CodecError> {
        self.detector.detect(frame)
    }

    fn embed(&mut self, frame: &Frame, face: &BoundingBox) -> Result<Embedding, CodecError> {
        self.embedder.embed(frame, face)
    }
}
