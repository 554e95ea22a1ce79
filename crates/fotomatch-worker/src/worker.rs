//! Photo-processing worker loop.
//!
//! Pulls pending photo jobs from the external queue, runs detection through
//! the engine, and writes the resulting face rows back through the external
//! store. The loop never retries a job itself (redelivery policy belongs to
//! the queue), and a failure on one photo never stops the others.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fotomatch_core::codec;
use fotomatch_core::detection::ImageData;
use fotomatch_core::BoundingBox;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::engine::{EngineError, EngineHandle};

/// Unit of work handed over by the external queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoJob {
    pub photo_id: String,
    pub storage_key: String,
    pub enqueued_at: DateTime<Utc>,
}

/// One detected face in storable form: the codec token plus its normalized
/// box, keyed by the face's detection index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFace {
    pub index: usize,
    pub encoding: String,
    pub bounding_box: BoundingBox,
}

/// External queue of pending photo jobs.
pub trait JobSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Pop the next pending job, or `None` when the queue is currently empty.
    /// An `Err` means the transport itself is broken and stops the worker.
    fn next_job(&mut self) -> impl Future<Output = Result<Option<PhotoJob>, Self::Error>> + Send;
}

/// External image acquisition: download and decode by storage key.
pub trait ImageSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn fetch(&self, storage_key: &str)
        -> impl Future<Output = Result<ImageData, Self::Error>> + Send;
}

/// External persistence for per-photo detection results.
pub trait FaceStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Record the faces of a processed photo. An empty slice is a valid
    /// outcome (a photo with no people in it) and marks the photo processed.
    fn store_faces(
        &self,
        photo_id: &str,
        faces: &[StoredFace],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Record that processing this photo failed, with a diagnostic.
    fn mark_failed(
        &self,
        photo_id: &str,
        reason: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Fatal worker failure: the job source transport broke. Per-job failures
/// are reported through [`FaceStore::mark_failed`] and never end the loop.
#[derive(Error, Debug)]
#[error("job source failed: {source}")]
pub struct WorkerError {
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

#[derive(Error, Debug)]
enum ProcessError {
    #[error("image fetch failed: {0}")]
    Fetch(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("face store failed: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Background photo-processing worker.
pub struct Worker<Q, I, S> {
    engine: EngineHandle,
    jobs: Q,
    images: I,
    store: S,
    poll_interval: Duration,
}

impl<Q: JobSource, I: ImageSource, S: FaceStore> Worker<Q, I, S> {
    pub fn new(engine: EngineHandle, jobs: Q, images: I, store: S, poll_interval: Duration) -> Self {
        Self {
            engine,
            jobs,
            images,
            store,
            poll_interval,
        }
    }

    /// Run until `shutdown` is signalled (or its sender dropped), or until
    /// the job source fails. An empty queue sleeps `poll_interval` between
    /// polls.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), WorkerError> {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "worker started"
        );

        loop {
            let job = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => {
                    tracing::info!("worker shutting down");
                    return Ok(());
                }
                job = self.jobs.next_job() => job.map_err(|e| WorkerError {
                    source: Box::new(e),
                })?,
            };

            match job {
                Some(job) => {
                    let photo_id = job.photo_id.clone();
                    if let Err(err) = self.process(job).await {
                        tracing::error!(
                            photo_id = %photo_id,
                            error = %err,
                            "photo processing failed"
                        );
                        if let Err(store_err) =
                            self.store.mark_failed(&photo_id, &err.to_string()).await
                        {
                            tracing::error!(
                                photo_id = %photo_id,
                                error = %store_err,
                                "could not record processing failure"
                            );
                        }
                    }
                }
                None => {
                    tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut shutdown) => {
                            tracing::info!("worker shutting down");
                            return Ok(());
                        }
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }
    }

    async fn process(&mut self, job: PhotoJob) -> Result<(), ProcessError> {
        let queued_ms = Utc::now()
            .signed_duration_since(job.enqueued_at)
            .num_milliseconds();
        tracing::info!(
            photo_id = %job.photo_id,
            storage_key = %job.storage_key,
            queued_ms,
            "processing photo"
        );

        let image = self
            .images
            .fetch(&job.storage_key)
            .await
            .map_err(|e| ProcessError::Fetch(Box::new(e)))?;

        let faces = self.engine.process_photo(image).await?;

        let stored: Vec<StoredFace> = faces
            .iter()
            .map(|face| StoredFace {
                index: face.index,
                encoding: codec::encode(&face.embedding),
                bounding_box: face.bounding_box,
            })
            .collect();

        self.store
            .store_faces(&job.photo_id, &stored)
            .await
            .map_err(|e| ProcessError::Store(Box::new(e)))?;

        tracing::info!(photo_id = %job.photo_id, faces = stored.len(), "photo processed");
        Ok(())
    }
}

/// Resolves once shutdown is signalled; a dropped sender counts as shutdown.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spawn_engine;
    use fotomatch_core::detection::{DetectionError, DetectionProvider, PixelBox, RawDetection};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    #[derive(Error, Debug)]
    #[error("queue closed")]
    struct QueueClosed;

    #[derive(Error, Debug)]
    #[error("object not found: {0}")]
    struct NotFound(String);

    /// Queue that serves its jobs, then reports the transport as broken so
    /// `run` terminates.
    struct FixedQueue {
        jobs: VecDeque<PhotoJob>,
    }

    impl JobSource for FixedQueue {
        type Error = QueueClosed;

        async fn next_job(&mut self) -> Result<Option<PhotoJob>, QueueClosed> {
            match self.jobs.pop_front() {
                Some(job) => Ok(Some(job)),
                None => Err(QueueClosed),
            }
        }
    }

    struct MapImages {
        images: HashMap<String, ImageData>,
    }

    impl ImageSource for MapImages {
        type Error = NotFound;

        async fn fetch(&self, storage_key: &str) -> Result<ImageData, NotFound> {
            self.images
                .get(storage_key)
                .cloned()
                .ok_or_else(|| NotFound(storage_key.to_string()))
        }
    }

    #[derive(Clone, Default)]
    struct MemoryStore {
        rows: Arc<Mutex<HashMap<String, Vec<StoredFace>>>>,
        failed: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl FaceStore for MemoryStore {
        type Error = std::convert::Infallible;

        async fn store_faces(
            &self,
            photo_id: &str,
            faces: &[StoredFace],
        ) -> Result<(), Self::Error> {
            self.rows
                .lock()
                .unwrap()
                .insert(photo_id.to_string(), faces.to_vec());
            Ok(())
        }

        async fn mark_failed(&self, photo_id: &str, reason: &str) -> Result<(), Self::Error> {
            self.failed
                .lock()
                .unwrap()
                .push((photo_id.to_string(), reason.to_string()));
            Ok(())
        }
    }

    /// Replays one scripted detection result per call.
    struct ScriptedProvider {
        responses: VecDeque<Result<Vec<RawDetection>, DetectionError>>,
    }

    impl DetectionProvider for ScriptedProvider {
        fn is_available(&self) -> bool {
            true
        }

        fn detect(&mut self, _image: &ImageData) -> Result<Vec<RawDetection>, DetectionError> {
            self.responses.pop_front().unwrap_or_else(|| Ok(vec![]))
        }
    }

    fn job(photo_id: &str, storage_key: &str) -> PhotoJob {
        PhotoJob {
            photo_id: photo_id.to_string(),
            storage_key: storage_key.to_string(),
            enqueued_at: Utc::now(),
        }
    }

    fn image(width: u32, height: u32) -> ImageData {
        ImageData {
            pixels: vec![0; (width * height) as usize],
            width,
            height,
        }
    }

    fn random_detection(rng: &mut StdRng) -> RawDetection {
        RawDetection {
            pixel_box: PixelBox {
                top: 10.0,
                right: 90.0,
                bottom: 90.0,
                left: 10.0,
            },
            embedding: (0..128).map(|_| rng.gen_range(-1.0..1.0)).collect(),
            detector_confidence: 0.95,
        }
    }

    fn worker_with(
        responses: Vec<Result<Vec<RawDetection>, DetectionError>>,
        jobs: Vec<PhotoJob>,
        images: HashMap<String, ImageData>,
        store: MemoryStore,
    ) -> Worker<FixedQueue, MapImages, MemoryStore> {
        let engine = spawn_engine(Box::new(ScriptedProvider {
            responses: responses.into(),
        }))
        .unwrap();
        Worker::new(
            engine,
            FixedQueue { jobs: jobs.into() },
            MapImages { images },
            store,
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_processes_jobs_and_stores_faces() {
        let mut rng = StdRng::seed_from_u64(7);
        let detections = vec![random_detection(&mut rng), random_detection(&mut rng)];
        let expected: Vec<Vec<f64>> = detections.iter().map(|d| d.embedding.clone()).collect();

        let store = MemoryStore::default();
        let worker = worker_with(
            vec![Ok(detections), Ok(vec![])],
            vec![job("p1", "k1"), job("p2", "k2")],
            HashMap::from([
                ("k1".to_string(), image(100, 100)),
                ("k2".to_string(), image(100, 100)),
            ]),
            store.clone(),
        );

        let (_tx, rx) = watch::channel(false);
        // Queue drains, then reports closed — that ends the run as an error
        assert!(worker.run(rx).await.is_err());

        let rows = store.rows.lock().unwrap();
        let p1 = &rows["p1"];
        assert_eq!(p1.len(), 2);
        for (face, values) in p1.iter().zip(&expected) {
            let decoded = codec::decode(&face.encoding).unwrap();
            assert_eq!(&decoded.values, values);
        }
        // Zero faces is a valid outcome, stored as an empty row
        assert_eq!(rows["p2"], vec![]);
        assert!(store.failed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_job_failure_is_isolated_and_reported() {
        let mut rng = StdRng::seed_from_u64(11);
        let store = MemoryStore::default();
        let worker = worker_with(
            vec![Ok(vec![random_detection(&mut rng)])],
            vec![job("missing", "nowhere"), job("good", "k1")],
            HashMap::from([("k1".to_string(), image(100, 100))]),
            store.clone(),
        );

        let (_tx, rx) = watch::channel(false);
        assert!(worker.run(rx).await.is_err());

        let failed = store.failed.lock().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "missing");
        assert!(failed[0].1.contains("nowhere"));
        // The failure did not stop the next job
        assert!(store.rows.lock().unwrap().contains_key("good"));
    }

    #[tokio::test]
    async fn test_shutdown_before_work_processes_nothing() {
        let store = MemoryStore::default();
        let worker = worker_with(
            vec![],
            vec![job("p1", "k1")],
            HashMap::from([("k1".to_string(), image(100, 100))]),
            store.clone(),
        );

        let (tx, rx) = watch::channel(true);
        worker.run(rx).await.unwrap();
        drop(tx);

        assert!(store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_idle_worker_stops_on_shutdown() {
        struct EmptyQueue;
        impl JobSource for EmptyQueue {
            type Error = QueueClosed;
            async fn next_job(&mut self) -> Result<Option<PhotoJob>, QueueClosed> {
                Ok(None)
            }
        }

        let engine = spawn_engine(Box::new(ScriptedProvider {
            responses: VecDeque::new(),
        }))
        .unwrap();
        let worker = Worker::new(
            engine,
            EmptyQueue,
            MapImages {
                images: HashMap::new(),
            },
            MemoryStore::default(),
            Duration::from_millis(5),
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop after shutdown signal")
            .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_photo_job_json_round_trip() {
        let original = job("photo-1", "events/42/photo-1.jpg");
        let json = serde_json::to_string(&original).unwrap();
        let back: PhotoJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
