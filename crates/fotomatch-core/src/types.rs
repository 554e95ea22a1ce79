use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Two embeddings of unequal length were compared.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("embedding length mismatch: {left} vs {right}")]
pub struct DimensionMismatch {
    pub left: usize,
    pub right: usize,
}

/// Face embedding vector (128-dimensional for the default encoder).
///
/// Elements are IEEE doubles; the stored representation must round-trip them
/// exactly, see [`crate::codec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f64>,
}

impl Embedding {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean (L2) distance to another embedding.
    ///
    /// Lower = more likely the same person. Comparing embeddings of unequal
    /// length is an error, never a silent truncation.
    pub fn distance(&self, other: &Embedding) -> Result<f64, DimensionMismatch> {
        if self.values.len() != other.values.len() {
            return Err(DimensionMismatch {
                left: self.values.len(),
                right: other.values.len(),
            });
        }

        let sum: f64 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        Ok(sum.sqrt())
    }
}

impl From<Vec<f64>> for Embedding {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}

/// Face location within a photo, as fractions of the photo's own dimensions.
///
/// `top`/`bottom` are fractions of the height, `left`/`right` fractions of the
/// width, each in `[0, 1]` with `top <= bottom` and `left <= right`. The
/// representation is resolution-independent: the same box fits a thumbnail
/// and the full-size render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// One face from a single detection call.
///
/// `index` is the face's 0-based position in the detector's output for that
/// call and stays stable even when other faces are filtered out later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub index: usize,
    pub embedding: Embedding,
    pub bounding_box: BoundingBox,
}

/// A stored face from a previously processed photo.
///
/// Identifiers are opaque strings minted by the processing pipeline; this
/// crate only reads them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoFaceCandidate {
    pub photo_id: String,
    pub face_id: String,
    pub embedding: Embedding,
}

/// A processed photo with all of its stored faces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoFaces {
    pub photo_id: String,
    pub faces: Vec<PhotoFaceCandidate>,
}

/// One candidate that fell within the match threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub photo_id: String,
    pub face_id: String,
    /// Position of the candidate in the input batch.
    pub index: usize,
    pub distance: f64,
    pub confidence: f64,
}

/// Per-photo aggregate: the single best matching face of one photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoMatch {
    pub photo_id: String,
    pub distance: f64,
    pub confidence: f64,
    /// Position of the winning face within the photo's face list.
    pub face_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_identical_is_zero() {
        let a = Embedding::new(vec![0.3, -1.2, 4.5]);
        assert_eq!(a.distance(&a).unwrap(), 0.0);
    }

    #[test]
    fn test_distance_known_value() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.distance(&b).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = Embedding::new(vec![1.0, 2.0, 3.0]);
        let b = Embedding::new(vec![-0.5, 0.25, 9.0]);
        assert_eq!(a.distance(&b).unwrap(), b.distance(&a).unwrap());
    }

    #[test]
    fn test_distance_non_negative() {
        let a = Embedding::new(vec![-4.0, -5.0]);
        let b = Embedding::new(vec![4.0, 5.0]);
        assert!(a.distance(&b).unwrap() >= 0.0);
    }

    #[test]
    fn test_distance_length_mismatch() {
        let a = Embedding::new(vec![0.0; 128]);
        let b = Embedding::new(vec![0.0; 64]);
        let err = a.distance(&b).unwrap_err();
        assert_eq!(err, DimensionMismatch { left: 128, right: 64 });
    }

    #[test]
    fn test_embedding_serializes_as_plain_array() {
        let a = Embedding::new(vec![1.0, 2.5]);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "[1.0,2.5]");
        let back: Embedding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
