//! fotomatch-worker — background photo processing.
//!
//! Owns the detection engine (a dedicated thread wrapping the external
//! [`DetectionProvider`](fotomatch_core::detection::DetectionProvider)) and
//! the job-polling worker loop that turns queued photos into stored face
//! rows. The queue transport, image download/decode, and persistence are
//! external capabilities the loop reaches through the [`worker`] traits.

pub mod config;
pub mod engine;
pub mod worker;

pub use config::WorkerConfig;
pub use engine::{spawn_engine, EngineError, EngineHandle};
pub use worker::{FaceStore, ImageSource, JobSource, PhotoJob, StoredFace, Worker};
