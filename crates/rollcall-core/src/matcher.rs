//! Nearest-match classification against the enrolled set.

use crate::cache::CacheSnapshot;
use crate::types::{Classification, Embedding, MatchResult};

/// Strategy for classifying a probe embedding against a cache snapshot.
pub trait Matcher {
    fn best_match(
        &self,
        probe: &Embedding,
        snapshot: &CacheSnapshot,
        threshold: f32,
    ) -> MatchResult;
}

/// Cosine-similarity matcher with threshold classification.
///
/// Scans every cached entry; the maximum-scoring person wins if its score
/// reaches the threshold, otherwise the probe is unknown with the best score
/// still reported for tuning. Snapshot entries are sorted by `person_id` and
/// comparison is strict, so an exact tie deterministically resolves to the
/// lower id.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn best_match(
        &self,
        probe: &Embedding,
        snapshot: &CacheSnapshot,
        threshold: f32,
    ) -> MatchResult {
        let mut best_sim = f32::NEG_INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, entry) in snapshot.entries().iter().enumerate() {
            let sim = probe.similarity(&entry.embedding);
            if sim > best_sim {
                best_sim = sim;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_sim >= threshold => {
                let entry = &snapshot.entries()[idx];
                MatchResult {
                    person_id: Some(entry.person_id.clone()),
                    display_name: Some(entry.display_name.clone()),
                    confidence: best_sim.clamp(0.0, 1.0),
                    classification: Classification::Identified,
                }
            }
            Some(_) => MatchResult::unknown(best_sim),
            // Empty cache: every probe is unknown, not an error.
            None => MatchResult::unknown(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::IdentityCache;
    use crate::store::IdentityStore;
    use crate::testutil::{trained_record, MemoryStore};

    fn snapshot_of(records: &[(&str, Vec<f32>)]) -> std::sync::Arc<CacheSnapshot> {
        let store = MemoryStore::new();
        for (id, values) in records {
            store.upsert(&trained_record(id, values.clone())).unwrap();
        }
        IdentityCache::bootstrap(&store).unwrap().snapshot()
    }

    #[test]
    fn identifies_above_threshold() {
        let snap = snapshot_of(&[("s1", vec![0.0, 1.0]), ("s2", vec![1.0, 0.0])]);
        let probe = Embedding::new(vec![1.0, 0.1]);

        let r = CosineMatcher.best_match(&probe, &snap, 0.4);
        assert_eq!(r.classification, Classification::Identified);
        assert_eq!(r.person_id.as_deref(), Some("s2"));
        assert!(r.confidence > 0.9);
    }

    #[test]
    fn unknown_below_threshold_still_reports_score() {
        let snap = snapshot_of(&[("s1", vec![0.0, 1.0])]);
        let probe = Embedding::new(vec![1.0, 0.3]);

        let r = CosineMatcher.best_match(&probe, &snap, 0.9);
        assert_eq!(r.classification, Classification::Unknown);
        assert!(r.person_id.is_none());
        assert!(r.confidence > 0.0, "best score is reported for tuning");
    }

    #[test]
    fn empty_cache_yields_unknown() {
        let snap = snapshot_of(&[]);
        let r = CosineMatcher.best_match(&Embedding::new(vec![1.0, 0.0]), &snap, 0.4);
        assert_eq!(r.classification, Classification::Unknown);
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn exact_tie_resolves_to_lower_person_id() {
        // Two persons with identical embeddings: identical similarity scores.
        let snap = snapshot_of(&[("s9", vec![1.0, 0.0]), ("s2", vec![1.0, 0.0])]);
        let probe = Embedding::new(vec![1.0, 0.0]);

        let r = CosineMatcher.best_match(&probe, &snap, 0.4);
        assert_eq!(r.person_id.as_deref(), Some("s2"));
    }

    #[test]
    fn threshold_monotonicity() {
        let snap = snapshot_of(&[("s1", vec![1.0, 0.0]), ("s2", vec![0.0, 1.0])]);
        let probes = [
            Embedding::new(vec![1.0, 0.05]),
            Embedding::new(vec![0.6, 0.8]),
            Embedding::new(vec![-1.0, 0.0]),
        ];

        let identified_at = |t: f32| -> Vec<usize> {
            probes
                .iter()
                .enumerate()
                .filter(|(_, p)| {
                    CosineMatcher.best_match(p, &snap, t).classification
                        == Classification::Identified
                })
                .map(|(i, _)| i)
                .collect()
        };

        let low = identified_at(0.3);
        let high = identified_at(0.8);
        for i in &high {
            assert!(low.contains(i), "t2-identified set must be subset of t1's");
        }
    }

    #[test]
    fn negative_similarity_reports_zero_confidence() {
        let snap = snapshot_of(&[("s1", vec![1.0, 0.0])]);
        let r = CosineMatcher.best_match(&Embedding::new(vec![-1.0, 0.0]), &snap, 0.4);
        assert_eq!(r.classification, Classification::Unknown);
        assert_eq!(r.confidence, 0.0);
    }
}
