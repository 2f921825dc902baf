use crate::error::{IndexError, IndexResult};
use crate::inference::EMBEDDING_DIM;

/// Split a batched embedder reply into per-face embeddings, each scaled to
/// unit L2 norm (a zero vector passes through untouched). A length mismatch
/// means the worker broke the tensor contract.
pub fn distribute_embeddings(output: Vec<f32>, face_count: usize) -> IndexResult<Vec<Vec<f32>>> {
    let expected = face_count * EMBEDDING_DIM;
    if output.len() != expected {
        return Err(IndexError::Inference(format!(
            "embedder returned {} values for {face_count} faces, expected {expected}",
            output.len()
        )));
    }

    Ok(output
        .chunks_exact(EMBEDDING_DIM)
        .map(|chunk| {
            let norm = chunk.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > f32::EPSILON {
                chunk.iter().map(|v| v / norm).collect()
            } else {
                chunk.to_vec()
            }
        })
        .collect())
}
