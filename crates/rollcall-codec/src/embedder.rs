//! ArcFace face embedder via ONNX Runtime.
//!
//! Produces 512-dimensional L2-normalized identity embeddings from a square
//! crop around the detected face, resized to the canonical 112x112 input.

use crate::preprocess;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rollcall_core::{BoundingBox, CodecError, Embedding, Frame};
use std::path::Path;
use thiserror::Error;

const EMBED_INPUT_SIZE: u32 = 112;
const EMBED_MEAN: f32 = 127.5;
const EMBED_STD: f32 = 127.5;
const EMBEDDING_DIM: usize = 512;
/// Extra context kept around the detector's box before cropping; the tight
/// detection box cuts off chin and forehead.
const CROP_MARGIN: f32 = 0.2;

#[derive(Error, Debug)]
pub enum EmbedderLoadError {
    #[error("model file not found: {0} — download w600k_r50.onnx and place in the model dir")]
    ModelNotFound(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based embedder.
pub struct FaceEmbedder {
    session: Session,
}

impl FaceEmbedder {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EmbedderLoadError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedderLoadError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "loaded ArcFace model");
        Ok(Self { session })
    }

    /// Extract an identity embedding for one detected face.
    pub fn embed(&mut self, frame: &Frame, face: &BoundingBox) -> Result<Embedding, CodecError> {
        if face.width < 1.0 || face.height < 1.0 {
            return Err(CodecError::NoFaceDetected);
        }

        let crop = preprocess::square_crop(frame, face, CROP_MARGIN);
        let aligned = preprocess::resize_bilinear(&crop, EMBED_INPUT_SIZE, EMBED_INPUT_SIZE);
        let input = Self::preprocess(&aligned);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())
                .map_err(|e| CodecError::Inference(e.to_string()))?])
            .map_err(|e| CodecError::Inference(e.to_string()))?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| CodecError::Inference(format!("embedding extraction: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(CodecError::Inference(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        let mut embedding = Embedding::new(raw.to_vec());
        embedding.l2_normalize();
        Ok(embedding)
    }

    /// Normalize a 112x112 grayscale crop into an NCHW tensor with the gray
    /// channel replicated to RGB.
    fn preprocess(aligned: &Frame) -> Array4<f32> {
        let size = EMBED_INPUT_SIZE as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for y in 0..size {
            for x in 0..size {
                let pixel = aligned.data.get(y * size + x).copied().unwrap_or(0) as f32;
                let v = (pixel - EMBED_MEAN) / EMBED_STD;
                tensor[[0, 0, y, x]] = v;
                tensor[[0, 1, y, x]] = v;
                tensor[[0, 2, y, x]] = v;
            }
        }
        tensor
    }
}
