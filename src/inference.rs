use crate::error::IndexResult;
use crate::types::Dimensions;

/// Candidate rows in the detector output tensor.
pub const DETECTOR_ROWS: usize = 25_200;
/// Values per detector row: box center/extent, score, five landmarks, one
/// ignored trailing value.
pub const DETECTOR_ROW_LEN: usize = 16;
/// Side length of the square model canvas the detector sees.
pub const MODEL_CANVAS_SIZE: u32 = 640;
/// Side length of the aligned face crop fed to the embedder.
pub const FACE_CROP_SIZE: usize = 112;
/// Length of one face embedding.
pub const EMBEDDING_DIM: usize = 192;
/// Faces per embedder invocation. Bounds peak memory and the duration of a
/// single inference call.
pub const EMBED_BATCH_SIZE: usize = 50;

/// The two suspending operations the pipeline delegates to an external
/// inference runtime. The handle is shared by the caller and serializes
/// access internally; the pipeline holds no state across invocations.
#[allow(async_fn_in_trait)]
pub trait InferenceWorker {
    /// Run the face detector over raw `[H, W, 4]` RGBA pixels and return the
    /// flat `[25200, 16]` output tensor in model-canvas coordinates.
    /// Letterboxing onto the canvas and input normalization happen inside the
    /// worker.
    async fn detect_faces(&self, rgba: &[u8], dims: Dimensions) -> IndexResult<Vec<f32>>;

    /// Compute embeddings for a batch of aligned face crops
    /// (`N * 112 * 112 * 3` channel-last floats in the embedder's input
    /// range); returns `N * 192` floats.
    async fn compute_face_embeddings(&self, aligned: &[f32]) -> IndexResult<Vec<f32>>;
}
