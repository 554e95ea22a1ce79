use fotomatch_core::detection::{self, DetectionError, DetectionProvider, ImageData};
use fotomatch_core::DetectedFace;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detection error: {0}")]
    Detection(#[from] DetectionError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from async callers to the engine thread.
enum EngineRequest {
    EncodeSelfie {
        image: ImageData,
        reply: oneshot::Sender<Result<DetectedFace, EngineError>>,
    },
    ProcessPhoto {
        image: ImageData,
        reply: oneshot::Sender<Result<Vec<DetectedFace>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Encode a selfie: detect faces, pick the primary one, return its
    /// embedding and box. Fails with `NoFaceDetected` when no person is
    /// visible; callers surface that differently from a detector fault.
    pub async fn encode_selfie(&self, image: ImageData) -> Result<DetectedFace, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::EncodeSelfie {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Process an event photo: detect all faces and normalize their boxes.
    /// A photo with no faces yields an empty list, not an error.
    pub async fn process_photo(&self, image: ImageData) -> Result<Vec<DetectedFace>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::ProcessPhoto {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread takes ownership of the detection provider and serves requests
/// sequentially; detection is CPU-bound, so one in-flight request per
/// provider is the intended shape. Fails fast when the provider reports
/// itself unavailable; there is no mock fallback outside test code.
pub fn spawn_engine(mut provider: Box<dyn DetectionProvider>) -> Result<EngineHandle, EngineError> {
    if !provider.is_available() {
        return Err(EngineError::Detection(DetectionError::Unavailable(
            "detection provider reports unavailable".to_string(),
        )));
    }

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("fotomatch-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::EncodeSelfie { image, reply } => {
                        let result = run_encode_selfie(provider.as_mut(), &image);
                        let _ = reply.send(result);
                    }
                    EngineRequest::ProcessPhoto { image, reply } => {
                        let result = run_process_photo(provider.as_mut(), &image);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}

fn run_encode_selfie(
    provider: &mut dyn DetectionProvider,
    image: &ImageData,
) -> Result<DetectedFace, EngineError> {
    let raw = provider.detect(image)?;
    tracing::debug!(detections = raw.len(), "selfie: detector returned");

    let face = detection::primary_face(&raw, image.width, image.height)?;
    tracing::info!(
        index = face.index,
        confidence = raw[face.index].detector_confidence,
        "selfie: primary face selected"
    );
    Ok(face)
}

fn run_process_photo(
    provider: &mut dyn DetectionProvider,
    image: &ImageData,
) -> Result<Vec<DetectedFace>, EngineError> {
    let raw = provider.detect(image)?;
    let faces = detection::normalize(&raw, image.width, image.height)?;
    tracing::debug!(
        detections = raw.len(),
        faces = faces.len(),
        "photo: detections normalized"
    );
    Ok(faces)
}
