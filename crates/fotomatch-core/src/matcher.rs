//! Threshold filtering, ranking, and per-photo aggregation.

use thiserror::Error;

use crate::config::MatchConfig;
use crate::metric::confidence_from_distance;
use crate::types::{Embedding, MatchResult, PhotoFaceCandidate, PhotoFaces, PhotoMatch};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchError {
    #[error("target embedding has {actual} elements, expected {expected}")]
    TargetDimension { expected: usize, actual: usize },
}

/// Compares a target embedding against stored photo faces.
///
/// Holds the immutable [`MatchConfig`]; one matcher is constructed at service
/// start and shared by every request. All operations are pure and synchronous,
/// so concurrent calls need no locking.
#[derive(Debug, Clone)]
pub struct FaceMatcher {
    config: MatchConfig,
}

impl FaceMatcher {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Rank all candidates within the match threshold against `target`.
    ///
    /// A candidate matches iff its distance is at or below the threshold
    /// (equality counts). Results are sorted by descending confidence,
    /// equivalently ascending distance; ties keep candidate input order, so
    /// identical inputs always produce identical output.
    ///
    /// A candidate whose embedding length differs from the target's is
    /// skipped with a warning rather than failing the batch; only a target
    /// of the wrong dimensionality fails the whole call.
    pub fn match_faces(
        &self,
        target: &Embedding,
        candidates: &[PhotoFaceCandidate],
    ) -> Result<Vec<MatchResult>, MatchError> {
        if target.len() != self.config.embedding_len() {
            return Err(MatchError::TargetDimension {
                expected: self.config.embedding_len(),
                actual: target.len(),
            });
        }

        let threshold = self.config.threshold();
        let mut matches = Vec::new();

        for (index, candidate) in candidates.iter().enumerate() {
            let distance = match target.distance(&candidate.embedding) {
                Ok(d) => d,
                Err(err) => {
                    tracing::warn!(
                        photo_id = %candidate.photo_id,
                        face_id = %candidate.face_id,
                        index,
                        error = %err,
                        "skipping candidate with malformed embedding"
                    );
                    continue;
                }
            };

            if distance <= threshold {
                matches.push(MatchResult {
                    photo_id: candidate.photo_id.clone(),
                    face_id: candidate.face_id.clone(),
                    index,
                    distance,
                    confidence: confidence_from_distance(distance),
                });
            }
        }

        // Stable sort: equal confidences keep input order
        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(matches)
    }

    /// The single best candidate within the threshold, if any.
    ///
    /// Shorthand over [`match_faces`](Self::match_faces) for callers that
    /// resolve one identity, e.g. "which enrolled guest is this face".
    pub fn best_match(
        &self,
        target: &Embedding,
        candidates: &[PhotoFaceCandidate],
    ) -> Result<Option<MatchResult>, MatchError> {
        Ok(self.match_faces(target, candidates)?.into_iter().next())
    }

    /// Find the photos the target person appears in.
    ///
    /// Each photo is reduced to its single best matching face: a photo
    /// appears at most once in the output no matter how many of its faces
    /// match. Photos with no stored faces are skipped entirely, not reported
    /// as non-matches. The final list is sorted by descending confidence with
    /// ties keeping photo input order.
    pub fn find_matching_photos(
        &self,
        target: &Embedding,
        photos: &[PhotoFaces],
    ) -> Result<Vec<PhotoMatch>, MatchError> {
        let mut results = Vec::new();

        for photo in photos {
            if photo.faces.is_empty() {
                continue;
            }

            let matches = self.match_faces(target, &photo.faces)?;
            let Some(best) = matches.into_iter().next() else {
                continue;
            };

            results.push(PhotoMatch {
                photo_id: photo.photo_id.clone(),
                distance: best.distance,
                confidence: best.confidence,
                face_index: best.index,
            });
        }

        results.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(results)
    }
}
