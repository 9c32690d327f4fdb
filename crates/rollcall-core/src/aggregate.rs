//! Multi-image enrollment aggregation.

use crate::types::Embedding;

/// Fold a set of per-image embeddings into one representative vector.
///
/// Policy: componentwise mean of all valid embeddings, re-normalized to unit
/// length. Codec embeddings are unit vectors and the mean of unit vectors is
/// shorter than unit; cosine thresholds assume normalized references, so the
/// result is rescaled before it is stored.
///
/// Returns `None` for an empty input — an empty accumulation must surface as
/// "no usable input", never as a silent zero vector.
pub fn aggregate_mean(embeddings: &[Embedding]) -> Option<Embedding> {
    let first = embeddings.first()?;
    let dim = first.dim();

    let mut sum = vec![0.0f32; dim];
    let mut used = 0usize;
    for e in embeddings {
        if e.dim() != dim {
            // A codec swap mid-batch is the only way to get here.
            tracing::warn!(
                expected = dim,
                got = e.dim(),
                "dropping embedding with mismatched dimension"
            );
            continue;
        }
        for (acc, v) in sum.iter_mut().zip(&e.values) {
            *acc += v;
        }
        used += 1;
    }

    if used == 0 {
        return None;
    }

    let inv = 1.0 / used as f32;
    for v in &mut sum {
        *v *= inv;
    }

    let mut mean = Embedding::new(sum);
    mean.l2_normalize();
    Some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_none() {
        assert!(aggregate_mean(&[]).is_none());
    }

    #[test]
    fn single_embedding_is_returned_normalized() {
        let out = aggregate_mean(&[Embedding::new(vec![3.0, 4.0])]).unwrap();
        assert!((out.values[0] - 0.6).abs() < 1e-6);
        assert!((out.values[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn mean_of_two_unit_vectors_is_renormalized() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        let out = aggregate_mean(&[a, b]).unwrap();
        // Mean is (0.5, 0.5); normalized to (1/sqrt2, 1/sqrt2).
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((out.values[0] - expected).abs() < 1e-6);
        assert!((out.values[1] - expected).abs() < 1e-6);
        let norm: f32 = out.values.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_dimension_is_dropped_not_fatal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let bad = Embedding::new(vec![1.0, 0.0, 0.0]);
        let out = aggregate_mean(&[a, bad]).unwrap();
        assert_eq!(out.dim(), 2);
        assert!((out.values[0] - 1.0).abs() < 1e-6);
    }
}
