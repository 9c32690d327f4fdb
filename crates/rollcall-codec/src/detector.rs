//! UltraFace face detector via ONNX Runtime.
//!
//! Runs the version-RFB-320 UltraFace model: a single pass over a 320x240
//! input producing per-anchor scores and corner-form boxes normalized to
//! [0, 1], followed by confidence filtering and NMS.

use crate::preprocess;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rollcall_core::{BoundingBox, CodecError, Frame};
use std::path::Path;
use thiserror::Error;

const ULTRAFACE_INPUT_WIDTH: u32 = 320;
const ULTRAFACE_INPUT_HEIGHT: u32 = 240;
const ULTRAFACE_MEAN: f32 = 127.0;
const ULTRAFACE_STD: f32 = 128.0;
const ULTRAFACE_CONFIDENCE_THRESHOLD: f32 = 0.65;
const ULTRAFACE_NMS_IOU: f32 = 0.3;

#[derive(Error, Debug)]
pub enum DetectorLoadError {
    #[error("model file not found: {0} — download version-RFB-320.onnx and place in the model dir")]
    ModelNotFound(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// UltraFace-based face detector.
pub struct FaceDetector {
    session: Session,
}

impl FaceDetector {
    /// Load the UltraFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorLoadError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorLoadError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded UltraFace model"
        );

        Ok(Self { session })
    }

    /// Detect faces in a grayscale frame.
    ///
    /// Returns bounding boxes in source pixel space, sorted by descending
    /// confidence. A face-free photo is an empty vec, not an error.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, CodecError> {
        if frame.data.len() != (frame.width * frame.height) as usize {
            return Err(CodecError::Unprocessable(format!(
                "frame buffer is {} bytes for {}x{}",
                frame.data.len(),
                frame.width,
                frame.height
            )));
        }

        let input = Self::preprocess(frame);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())
                .map_err(|e| CodecError::Inference(e.to_string()))?])
            .map_err(|e| CodecError::Inference(e.to_string()))?;

        // Output 0: scores [1, N, 2] (background, face). Output 1: boxes
        // [1, N, 4] as normalized (x1, y1, x2, y2).
        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| CodecError::Inference(format!("scores: {e}")))?;
        let (_, boxes) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| CodecError::Inference(format!("boxes: {e}")))?;

        let anchors = scores.len() / 2;
        if boxes.len() != anchors * 4 {
            return Err(CodecError::Inference(format!(
                "score/box anchor mismatch: {} vs {}",
                scores.len(),
                boxes.len()
            )));
        }

        let mut detections = Vec::new();
        for i in 0..anchors {
            let confidence = scores[i * 2 + 1];
            if confidence < ULTRAFACE_CONFIDENCE_THRESHOLD {
                continue;
            }
            let x1 = boxes[i * 4].clamp(0.0, 1.0) * frame.width as f32;
            let y1 = boxes[i * 4 + 1].clamp(0.0, 1.0) * frame.height as f32;
            let x2 = boxes[i * 4 + 2].clamp(0.0, 1.0) * frame.width as f32;
            let y2 = boxes[i * 4 + 3].clamp(0.0, 1.0) * frame.height as f32;
            if x2 <= x1 || y2 <= y1 {
                continue;
            }
            detections.push(BoundingBox {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
                confidence,
            });
        }

        let kept = non_max_suppression(detections, ULTRAFACE_NMS_IOU);
        tracing::debug!(faces = kept.len(), "detection complete");
        Ok(kept)
    }

    /// Stretch-resize to 320x240 and normalize into an NCHW tensor, the
    /// grayscale channel replicated to RGB.
    fn preprocess(frame: &Frame) -> Array4<f32> {
        let resized = preprocess::resize_bilinear(frame, ULTRAFACE_INPUT_WIDTH, ULTRAFACE_INPUT_HEIGHT);
        let (w, h) = (ULTRAFACE_INPUT_WIDTH as usize, ULTRAFACE_INPUT_HEIGHT as usize);
        let mut tensor = Array4::<f32>::zeros((1, 3, h, w));

        for y in 0..h {
            for x in 0..w {
                let v = (resized.data[y * w + x] as f32 - ULTRAFACE_MEAN) / ULTRAFACE_STD;
                tensor[[0, 0, y, x]] = v;
                tensor[[0, 1, y, x]] = v;
                tensor[[0, 2, y, x]] = v;
            }
        }
        tensor
    }
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let ix1 = a.x.max(b.x);
    let iy1 = a.y.max(b.y);
    let ix2 = (a.x + a.width).min(b.x + b.width);
    let iy2 = (a.y + a.height).min(b.y + b.height);

    let iw = (ix2 - ix1).max(0.0);
    let ih = (iy2 - iy1).max(0.0);
    let inter = iw * ih;
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// Greedy NMS: keep the highest-confidence box, drop overlaps above `iou_max`.
fn non_max_suppression(mut detections: Vec<BoundingBox>, iou_max: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<BoundingBox> = Vec::new();
    for det in detections {
        if kept.iter().all(|k| iou(k, &det) <= iou_max) {
            kept.push(det);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, w: f32, h: f32, confidence: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence,
        }
    }

    #[test]
    fn iou_disjoint_is_zero() {
        let a = bbox(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = bbox(20.0, 20.0, 10.0, 10.0, 1.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn iou_identical_is_one() {
        let a = bbox(5.0, 5.0, 10.0, 10.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn nms_keeps_highest_confidence_of_overlapping_pair() {
        let dets = vec![
            bbox(0.0, 0.0, 10.0, 10.0, 0.7),
            bbox(1.0, 1.0, 10.0, 10.0, 0.9),
        ];
        let kept = non_max_suppression(dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn nms_keeps_separated_faces() {
        let dets = vec![
            bbox(0.0, 0.0, 10.0, 10.0, 0.9),
            bbox(50.0, 50.0, 10.0, 10.0, 0.8),
            bbox(100.0, 0.0, 10.0, 10.0, 0.7),
        ];
        let kept = non_max_suppression(dets, 0.3);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn nms_output_sorted_by_confidence() {
        let dets = vec![
            bbox(50.0, 50.0, 10.0, 10.0, 0.8),
            bbox(0.0, 0.0, 10.0, 10.0, 0.95),
        ];
        let kept = non_max_suppression(dets, 0.3);
        assert!(kept[0].confidence >= kept[1].confidence);
    }

    #[test]
    fn preprocess_shape_and_normalization() {
        let frame = Frame::new(vec![127u8; 64 * 48], 64, 48);
        let tensor = FaceDetector::preprocess(&frame);
        assert_eq!(tensor.shape(), &[1, 3, 240, 320]);
        // Pixel 127 with mean 127 normalizes to 0.
        assert!(tensor[[0, 0, 0, 0]].abs() < 1e-6);
    }
}
