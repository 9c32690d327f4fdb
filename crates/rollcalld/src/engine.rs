//! Recognition engine thread.
//!
//! The ONNX sessions are not shareable across threads, so a dedicated OS
//! thread owns the orchestrator (codec + store + cache) and serves requests
//! from the D-Bus handlers over an mpsc channel. Cache snapshots keep
//! recognition state consistent regardless of how requests interleave here.

use crate::annotate;
use crate::config::Config;
use rollcall_codec::{decode_image, downscale, to_frame, CodecLoadError, OnnxCodec};
use rollcall_core::{
    Orchestrator, PersonRecord, RecognitionReport, RecognizeError, StoreError, TrainError,
};
use rollcall_store::SqliteStore;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    Recognize(#[from] RecognizeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    CodecLoad(#[from] CodecLoadError),
    #[error("enrollment batch too large: {got} images (max {max})")]
    BatchTooLarge { got: usize, max: usize },
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of an enrollment request.
pub struct TrainSummary {
    pub person_id: String,
    pub images_supplied: usize,
    pub images_used: usize,
}

/// Result of a recognition request.
pub struct RecognizeSummary {
    pub request_id: Uuid,
    pub report: RecognitionReport,
    pub threshold: f32,
    /// Where the annotated copy landed, when archival succeeded.
    pub annotated_path: Option<String>,
}

enum EngineRequest {
    Train {
        person_id: String,
        display_name: String,
        metadata: serde_json::Value,
        images: Vec<Vec<u8>>,
        reply: oneshot::Sender<Result<TrainSummary, EngineError>>,
    },
    Recognize {
        image: Vec<u8>,
        threshold: Option<f32>,
        reply: oneshot::Sender<Result<RecognizeSummary, EngineError>>,
    },
    Remove {
        person_id: String,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    SetEnabled {
        person_id: String,
        enabled: bool,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    TrainingStatus {
        person_id: String,
        reply: oneshot::Sender<Result<Option<PersonRecord>, EngineError>>,
    },
    ListEnrolled {
        reply: oneshot::Sender<Vec<(String, String)>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    pub async fn train(
        &self,
        person_id: String,
        display_name: String,
        metadata: serde_json::Value,
        images: Vec<Vec<u8>>,
    ) -> Result<TrainSummary, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Train {
                person_id,
                display_name,
                metadata,
                images,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn recognize(
        &self,
        image: Vec<u8>,
        threshold: Option<f32>,
    ) -> Result<RecognizeSummary, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Recognize {
                image,
                threshold,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn remove(&self, person_id: String) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Remove {
                person_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn set_enabled(&self, person_id: String, enabled: bool) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::SetEnabled {
                person_id,
                enabled,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn training_status(
        &self,
        person_id: String,
    ) -> Result<Option<PersonRecord>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::TrainingStatus {
                person_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn list_enrolled(&self) -> Result<Vec<(String, String)>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::ListEnrolled { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

struct EngineState {
    orchestrator: Orchestrator<SqliteStore, OnnxCodec>,
    max_enroll_images: usize,
    max_image_dim: u32,
    archive_enabled: bool,
    archive_dir: std::path::PathBuf,
}

/// Spawn the engine on a dedicated OS thread.
///
/// Opens the identity store, loads both ONNX models and builds the identity
/// cache before the thread starts — startup fails fast if any of them is
/// unavailable.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let store = SqliteStore::open(&config.db_path)?;

    let codec = OnnxCodec::load(
        &config.detector_model_path(),
        &config.embedder_model_path(),
    )?;

    let orchestrator = Orchestrator::bootstrap(store, codec, config.similarity_threshold)?;

    let mut state = EngineState {
        orchestrator,
        max_enroll_images: config.max_enroll_images,
        max_image_dim: config.max_image_dim,
        archive_enabled: config.archive_enabled,
        archive_dir: config.archive_dir.clone(),
    };

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Train {
                        person_id,
                        display_name,
                        metadata,
                        images,
                        reply,
                    } => {
                        let result =
                            run_train(&mut state, &person_id, &display_name, metadata, &images);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Recognize {
                        image,
                        threshold,
                        reply,
                    } => {
                        let result = run_recognize(&mut state, &image, threshold);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Remove { person_id, reply } => {
                        let result = state
                            .orchestrator
                            .remove(&person_id)
                            .map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                    EngineRequest::SetEnabled {
                        person_id,
                        enabled,
                        reply,
                    } => {
                        let result = state
                            .orchestrator
                            .set_enabled(&person_id, enabled)
                            .map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                    EngineRequest::TrainingStatus { person_id, reply } => {
                        let result = state
                            .orchestrator
                            .training_status(&person_id)
                            .map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                    EngineRequest::ListEnrolled { reply } => {
                        let _ = reply.send(state.orchestrator.list_enrolled());
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}

/// Decode the enrollment batch and aggregate it into one reference identity.
/// Images that fail to decode are dropped like face-free ones; the summary
/// still reports them against `images_supplied`.
fn run_train(
    state: &mut EngineState,
    person_id: &str,
    display_name: &str,
    metadata: serde_json::Value,
    images: &[Vec<u8>],
) -> Result<TrainSummary, EngineError> {
    if images.len() > state.max_enroll_images {
        return Err(EngineError::BatchTooLarge {
            got: images.len(),
            max: state.max_enroll_images,
        });
    }

    let supplied = images.len();
    let mut frames = Vec::with_capacity(supplied);
    for (i, bytes) in images.iter().enumerate() {
        match decode_image(bytes) {
            Ok(img) => frames.push(to_frame(&downscale(img, state.max_image_dim))),
            Err(err) => {
                tracing::warn!(person_id, image = i + 1, error = %err, "enrollment image undecodable");
            }
        }
    }

    if frames.is_empty() {
        return Err(TrainError::NoUsableImage { supplied }.into());
    }

    // Report the uploaded count, not the decoded count, if nothing was usable.
    let outcome = state
        .orchestrator
        .train(person_id, display_name, metadata, &frames)
        .map_err(|e| match e {
            TrainError::NoUsableImage { .. } => TrainError::NoUsableImage { supplied }.into(),
            other => EngineError::from(other),
        })?;

    Ok(TrainSummary {
        person_id: person_id.to_string(),
        images_supplied: supplied,
        images_used: outcome.images_used,
    })
}

/// Decode the group photo, run recognition and archive an annotated copy.
fn run_recognize(
    state: &mut EngineState,
    image: &[u8],
    threshold: Option<f32>,
) -> Result<RecognizeSummary, EngineError> {
    let decoded = decode_image(image)
        .map_err(|e| RecognizeError::ImageUnprocessable(e.to_string()))?;
    let decoded = downscale(decoded, state.max_image_dim);
    let frame = to_frame(&decoded);

    let report = state.orchestrator.recognize(&frame, threshold)?;
    let request_id = Uuid::new_v4();

    // Archival is best-effort: a full disk must not fail attendance taking.
    let annotated_path = if state.archive_enabled {
        match annotate::archive_annotated(&state.archive_dir, request_id, &decoded, &report.faces) {
            Ok(path) => Some(path.to_string_lossy().into_owned()),
            Err(err) => {
                tracing::warn!(%request_id, error = %err, "annotated image archival failed");
                None
            }
        }
    } else {
        None
    };

    Ok(RecognizeSummary {
        request_id,
        report,
        threshold: threshold.unwrap_or(state.orchestrator.default_threshold()),
        annotated_path,
    })
}
