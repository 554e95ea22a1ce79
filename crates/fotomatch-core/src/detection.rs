//! External detection contract and result normalization.
//!
//! The neural face detector/embedder is an external capability behind
//! [`DetectionProvider`]: it reports pixel-space boxes and raw embedding
//! vectors, and this module converts them into the crate's
//! resolution-independent [`DetectedFace`] representation. "No person
//! visible" ([`DetectionError::NoFaceDetected`]) and "the detector broke"
//! ([`DetectionError::Failed`]) stay distinct all the way up: the first is
//! an actionable user message, the second an operational fault.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BoundingBox, DetectedFace, Embedding};

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("no face detected")]
    NoFaceDetected,
    #[error("face detection failed: {0}")]
    Failed(String),
    #[error("face detection provider is not available: {0}")]
    Unavailable(String),
    #[error("image has degenerate dimensions {width}x{height}")]
    InvalidImageDimensions { width: u32, height: u32 },
}

/// Decoded image handed over by the external acquisition layer.
///
/// The core never downloads or decodes images itself; callers supply pixels
/// plus the dimensions the detector's pixel coordinates refer to.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Face box in pixel coordinates, as reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBox {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl PixelBox {
    /// Box area in square pixels.
    pub fn area(&self) -> f64 {
        (self.bottom - self.top) * (self.right - self.left)
    }

    fn is_well_formed(&self) -> bool {
        let edges = [self.top, self.right, self.bottom, self.left];
        edges.iter().all(|v| v.is_finite()) && self.top <= self.bottom && self.left <= self.right
    }
}

/// One face as reported by the external detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub pixel_box: PixelBox,
    pub embedding: Vec<f64>,
    pub detector_confidence: f64,
}

/// Capability contract for the external face detection/embedding provider.
pub trait DetectionProvider: Send {
    /// Whether the provider can currently serve detections. A provider that
    /// reports `false` here fails requests with
    /// [`DetectionError::Unavailable`].
    fn is_available(&self) -> bool;

    /// Detect all faces in the image, returning one raw detection per face.
    fn detect(&mut self, image: &ImageData) -> Result<Vec<RawDetection>, DetectionError>;
}

/// Convert raw pixel-space detections into resolution-independent faces.
///
/// `top`/`bottom` divide by the image height, `left`/`right` by the width,
/// clamped to `[0, 1]` so boxes reaching past the frame stay within the
/// normalized range. A detection whose box is inverted or non-finite is
/// dropped with a warning. Each surviving face keeps its 0-based position in
/// the INPUT sequence as `index`, so indices stay valid identifiers back to
/// the detector output even after filtering.
pub fn normalize(
    raw: &[RawDetection],
    image_width: u32,
    image_height: u32,
) -> Result<Vec<DetectedFace>, DetectionError> {
    if image_width == 0 || image_height == 0 {
        return Err(DetectionError::InvalidImageDimensions {
            width: image_width,
            height: image_height,
        });
    }

    let width = f64::from(image_width);
    let height = f64::from(image_height);
    let mut faces = Vec::with_capacity(raw.len());

    for (index, detection) in raw.iter().enumerate() {
        if !detection.pixel_box.is_well_formed() {
            tracing::warn!(
                index,
                pixel_box = ?detection.pixel_box,
                "skipping detection with degenerate bounding box"
            );
            continue;
        }

        let bounding_box = BoundingBox {
            top: (detection.pixel_box.top / height).clamp(0.0, 1.0),
            right: (detection.pixel_box.right / width).clamp(0.0, 1.0),
            bottom: (detection.pixel_box.bottom / height).clamp(0.0, 1.0),
            left: (detection.pixel_box.left / width).clamp(0.0, 1.0),
        };

        faces.push(DetectedFace {
            index,
            embedding: Embedding::from(detection.embedding.clone()),
            bounding_box,
        });
    }

    Ok(faces)
}

/// Select the primary face of a multi-face detection.
///
/// This is the selfie-encoding rule: the face whose PIXEL box covers the
/// largest area wins, ties broken by lowest original index. Zero usable
/// detections fail with [`DetectionError::NoFaceDetected`].
pub fn primary_face(
    raw: &[RawDetection],
    image_width: u32,
    image_height: u32,
) -> Result<DetectedFace, DetectionError> {
    let faces = normalize(raw, image_width, image_height)?;

    let mut best: Option<DetectedFace> = None;
    let mut best_area = f64::NEG_INFINITY;
    for face in faces {
        // index points back into `raw`, so the comparison uses pixel area
        let area = raw[face.index].pixel_box.area();
        if area > best_area {
            best_area = area;
            best = Some(face);
        }
    }

    best.ok_or(DetectionError::NoFaceDetected)
}
