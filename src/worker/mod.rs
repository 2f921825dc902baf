//! ONNX-backed implementation of the inference-worker interface, for hosts
//! that run the models in-process instead of delegating to a native worker.

pub mod onnx;
mod preprocess;

use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::Lazy;
use ort::session::Session;
use tracing::info;

use crate::error::{IndexError, IndexResult};
use crate::inference::{FACE_CROP_SIZE, InferenceWorker, MODEL_CANVAS_SIZE};
use crate::types::Dimensions;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderPolicy {
    pub prefer_coreml: bool,
    pub prefer_nnapi: bool,
    pub allow_cpu_fallback: bool,
}

impl Default for ProviderPolicy {
    fn default() -> Self {
        Self {
            prefer_coreml: true,
            prefer_nnapi: true,
            allow_cpu_fallback: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    pub detector_model: String,
    pub embedder_model: String,
    pub provider_policy: ProviderPolicy,
}

/// Inference worker backed by two ONNX sessions. Each call locks its
/// session, so one handle can serve concurrent indexing invocations.
#[derive(Debug)]
pub struct OnnxWorker {
    detector: Mutex<Session>,
    embedder: Mutex<Session>,
}

impl OnnxWorker {
    pub fn from_config(config: &WorkerConfig) -> IndexResult<Self> {
        let detector = onnx::build_session(&config.detector_model, &config.provider_policy)?;
        let embedder = onnx::build_session(&config.embedder_model, &config.provider_policy)?;
        info!(
            detector = %config.detector_model,
            embedder = %config.embedder_model,
            "built inference sessions"
        );
        Ok(Self {
            detector: Mutex::new(detector),
            embedder: Mutex::new(embedder),
        })
    }
}

impl InferenceWorker for OnnxWorker {
    async fn detect_faces(&self, rgba: &[u8], dims: Dimensions) -> IndexResult<Vec<f32>> {
        let input = preprocess::letterbox_to_canvas(rgba, dims)?;
        let canvas = MODEL_CANVAS_SIZE as i64;
        let mut session = lock_session(&self.detector);
        let (_, output) = onnx::run_f32(&mut session, input, vec![1, 3, canvas, canvas])?;
        Ok(output)
    }

    async fn compute_face_embeddings(&self, aligned: &[f32]) -> IndexResult<Vec<f32>> {
        let batch = embedding_batch_size(aligned)?;
        let crop = FACE_CROP_SIZE as i64;
        let mut session = lock_session(&self.embedder);
        let (_, output) = onnx::run_f32(
            &mut session,
            aligned.to_vec(),
            vec![batch as i64, crop, crop, 3],
        )?;
        Ok(output)
    }
}

// A panicked inference call must not wedge every later invocation.
fn lock_session(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    match session.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Number of faces in an aligned batch buffer; ragged buffers never reach
/// the session.
fn embedding_batch_size(aligned: &[f32]) -> IndexResult<usize> {
    let per_face = FACE_CROP_SIZE * FACE_CROP_SIZE * 3;
    if aligned.is_empty() || aligned.len() % per_face != 0 {
        return Err(IndexError::Inference(format!(
            "aligned batch length {} is not a positive multiple of {per_face}",
            aligned.len()
        )));
    }
    Ok(aligned.len() / per_face)
}

struct SharedWorker {
    config: WorkerConfig,
    worker: Arc<OnnxWorker>,
}

static SHARED_WORKER: Lazy<Mutex<Option<SharedWorker>>> = Lazy::new(|| Mutex::new(None));

fn lock_shared() -> MutexGuard<'static, Option<SharedWorker>> {
    match SHARED_WORKER.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            // Recover from a previous panic by clearing the shared state.
            let mut guard = poisoned.into_inner();
            *guard = None;
            guard
        }
    }
}

/// Process-wide worker for hosts that index many files with one model set.
/// Reuses the sessions while the config is unchanged; a config change
/// rebuilds them.
pub fn ensure_worker(config: &WorkerConfig) -> IndexResult<Arc<OnnxWorker>> {
    {
        let guard = lock_shared();
        if let Some(shared) = guard.as_ref() {
            if shared.config == *config {
                return Ok(Arc::clone(&shared.worker));
            }
        }
    }

    let worker = Arc::new(OnnxWorker::from_config(config)?);
    let mut guard = lock_shared();
    *guard = Some(SharedWorker {
        config: config.clone(),
        worker: Arc::clone(&worker),
    });
    Ok(worker)
}

/// Drop the process-wide worker and its sessions.
pub fn release_worker() {
    *lock_shared() = None;
}
