//! fotomatch-core — face-embedding matching pipeline.
//!
//! An event guest uploads a selfie; the service answers with the event photos
//! the guest appears in. This crate owns the pure part of that pipeline: the
//! embedding codec, distance and confidence, threshold filtering with ranking,
//! per-photo aggregation, and normalization of external detector output.
//! Detection itself, image acquisition, persistence, and the request layer
//! are external collaborators reached through the contracts in [`detection`].

pub mod codec;
pub mod config;
pub mod detection;
pub mod matcher;
pub mod metric;
pub mod types;

pub use config::{MatchConfig, DEFAULT_EMBEDDING_LEN, DEFAULT_MATCH_THRESHOLD};
pub use matcher::FaceMatcher;
pub use types::{
    BoundingBox, DetectedFace, Embedding, MatchResult, PhotoFaceCandidate, PhotoFaces, PhotoMatch,
};
