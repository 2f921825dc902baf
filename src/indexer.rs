use tracing::debug;

use crate::error::{IndexError, IndexResult};
use crate::face::{align, blur, detect, embed};
use crate::inference::{EMBED_BATCH_SIZE, FACE_CROP_SIZE, InferenceWorker};
use crate::types::{
    DecodedImage, Face, FaceAlignment, FaceBox, FaceDetection, FaceIndex, make_face_id,
};

struct PendingFace {
    face_id: String,
    detection: FaceDetection,
    score: f32,
    alignment: FaceAlignment,
}

/// Index every face in one photograph.
///
/// Runs the detector over the raw pixels, remaps detections out of the model
/// canvas into source coordinates, aligns and embeds each face in batches,
/// scores blur, and returns the faces normalized to the unit square in the
/// order the detector emitted them. The result is a pure function of the
/// pixels, the model weights and the pipeline version; either a complete
/// index comes back or an error, never a partial one.
pub async fn index_faces<W: InferenceWorker>(
    worker: &W,
    file_id: i64,
    image: &DecodedImage,
) -> IndexResult<FaceIndex> {
    image.validate()?;
    let dims = image.dimensions;

    let tensor = worker.detect_faces(&image.rgba, dims).await?;
    let candidates = detect::decode_detector_output(&tensor)?;
    debug!(file_id, candidates = candidates.len(), "decoded detector output");

    let in_box = detect::letterbox_box(dims);
    let to_box = FaceBox {
        x: 0.0,
        y: 0.0,
        width: dims.width as f32,
        height: dims.height as f32,
    };

    // Face ids come from the source-pixel box, never the canvas box. A
    // degenerate alignment drops its face; everything else aborts the image.
    let mut pending = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let detection = detect::remap_detection(&candidate.detection, &in_box, &to_box);
        let face_id = make_face_id(file_id, &detection.bounding_box, dims);
        match align::estimate_alignment(&detection) {
            Ok(alignment) => pending.push(PendingFace {
                face_id,
                detection,
                score: candidate.score,
                alignment,
            }),
            Err(IndexError::DegenerateAlignment) => {
                debug!(face_id = %face_id, "dropping face with degenerate alignment");
            }
            Err(e) => return Err(e),
        }
    }

    let crop_len = FACE_CROP_SIZE * FACE_CROP_SIZE * 3;
    let mut faces = Vec::with_capacity(pending.len());
    for batch in pending.chunks(EMBED_BATCH_SIZE) {
        let mut kept = Vec::with_capacity(batch.len());
        let mut raw_crops = Vec::with_capacity(batch.len());
        for face in batch {
            match align::warp_aligned_crop(image, &face.alignment) {
                Ok(raw) => {
                    kept.push(face);
                    raw_crops.push(raw);
                }
                Err(IndexError::DegenerateAlignment) => {
                    debug!(face_id = %face.face_id, "dropping face with singular warp");
                }
                Err(e) => return Err(e),
            }
        }
        if kept.is_empty() {
            continue;
        }

        let mut input = Vec::with_capacity(kept.len() * crop_len);
        for raw in &raw_crops {
            align::normalize_for_embedding(raw, &mut input);
        }
        let output = worker.compute_face_embeddings(&input).await?;
        let embeddings = embed::distribute_embeddings(output, kept.len())?;

        for ((face, raw), embedding) in kept.iter().zip(&raw_crops).zip(embeddings) {
            faces.push(Face {
                face_id: face.face_id.clone(),
                detection: face.detection.normalized(dims),
                score: face.score,
                blur: blur::compute_blur(raw, &face.detection.landmarks),
                embedding,
            });
        }
    }

    debug!(file_id, faces = faces.len(), "assembled face index");
    Ok(FaceIndex {
        width: dims.width,
        height: dims.height,
        faces,
    })
}
