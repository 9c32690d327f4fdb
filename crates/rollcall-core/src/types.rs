use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, in source-image pixel space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Face embedding vector (dimension fixed by the codec, typically 512).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute cosine similarity with another embedding.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar. Zero-norm inputs
    /// compare as 0.0 rather than dividing by zero.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }

    /// Scale to unit L2 norm. A zero vector is left unchanged.
    pub fn l2_normalize(&mut self) {
        let norm: f32 = self.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut self.values {
                *v /= norm;
            }
        }
    }
}

/// A person enrolled for recognition, as held in the identity store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    pub person_id: String,
    pub display_name: String,
    /// Present once the person has been trained at least once.
    pub embedding: Option<Embedding>,
    /// Number of enrollment images that contributed to the current embedding.
    /// Always >= 1 when `embedding` is present.
    pub training_image_count: u32,
    pub enabled: bool,
    pub last_trained_at: Option<DateTime<Utc>>,
    /// Free-form caller metadata (department, email, ...), stored verbatim.
    pub metadata: serde_json::Value,
}

/// Decoded single-channel (grayscale) image handed to the face codec.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }
}

/// How a probe face was classified against the enrolled set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Identified,
    Unknown,
}

/// Outcome of matching one probe face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// `None` when the face could not be identified.
    pub person_id: Option<String>,
    pub display_name: Option<String>,
    /// Best similarity observed, clamped to [0, 1]. Reported even for
    /// unknown faces so callers can tune the threshold.
    pub confidence: f32,
    pub classification: Classification,
}

impl MatchResult {
    /// An unknown-face result carrying the given best score.
    pub fn unknown(confidence: f32) -> Self {
        Self {
            person_id: None,
            display_name: None,
            confidence: confidence.clamp(0.0, 1.0),
            classification: Classification::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_identical() {
        let a = Embedding::new(vec![1.0, 0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn similarity_orthogonal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn similarity_opposite() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![-1.0, 0.0]);
        assert!((a.similarity(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn similarity_zero_vector() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn l2_normalize_scales_to_unit() {
        let mut e = Embedding::new(vec![3.0, 4.0]);
        e.l2_normalize();
        assert!((e.values[0] - 0.6).abs() < 1e-6);
        assert!((e.values[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_leaves_zero_vector() {
        let mut e = Embedding::new(vec![0.0, 0.0]);
        e.l2_normalize();
        assert_eq!(e.values, vec![0.0, 0.0]);
    }

    #[test]
    fn unknown_result_clamps_confidence() {
        let r = MatchResult::unknown(-0.3);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.classification, Classification::Unknown);
        assert!(r.person_id.is_none());
    }
}
