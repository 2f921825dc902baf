use thiserror::Error;

pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("inference worker failed: {0}")]
    Inference(String),
    #[error("malformed detector output: expected {expected} values, got {actual}")]
    MalformedDetectorOutput { expected: usize, actual: usize },
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// The similarity fit collapsed (coincident landmarks). The orchestrator
    /// drops the affected face and keeps indexing the rest of the image.
    #[error("degenerate face alignment")]
    DegenerateAlignment,
    #[error("face thumbnail generation failed: {0}")]
    Thumbnail(String),
}

impl<R> From<ort::Error<R>> for IndexError {
    fn from(value: ort::Error<R>) -> Self {
        IndexError::Inference(value.to_string())
    }
}
