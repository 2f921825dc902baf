use crate::error::{IndexError, IndexResult};
use crate::inference::{DETECTOR_ROWS, DETECTOR_ROW_LEN, MODEL_CANVAS_SIZE};
use crate::types::{Dimensions, FaceBox, FaceDetection, Point, ScoredDetection};

/// Candidates below this detector confidence are discarded.
const MIN_SCORE: f32 = 0.7;

/// Decode the raw `[25200, 16]` detector tensor into scored detections in
/// model-canvas coordinates. Row order among accepted rows is preserved; the
/// caller relies on it for stable face ordering.
pub fn decode_detector_output(output: &[f32]) -> IndexResult<Vec<ScoredDetection>> {
    let expected = DETECTOR_ROWS * DETECTOR_ROW_LEN;
    if output.len() != expected {
        return Err(IndexError::MalformedDetectorOutput {
            expected,
            actual: output.len(),
        });
    }

    let mut detections = Vec::new();
    for row in output.chunks_exact(DETECTOR_ROW_LEN) {
        let score = row[4];
        if score < MIN_SCORE {
            continue;
        }

        // Rows carry box centers; detections carry top-left corners.
        let bounding_box = FaceBox {
            x: row[0] - row[2] / 2.0,
            y: row[1] - row[3] / 2.0,
            width: row[2],
            height: row[3],
        };
        let landmarks = [
            Point { x: row[5], y: row[6] },
            Point { x: row[7], y: row[8] },
            Point { x: row[9], y: row[10] },
            Point { x: row[11], y: row[12] },
            Point { x: row[13], y: row[14] },
        ];

        detections.push(ScoredDetection {
            detection: FaceDetection {
                bounding_box,
                landmarks,
            },
            score,
        });
    }

    Ok(detections)
}

/// Size of the image once letterboxed onto the model canvas, preserving the
/// aspect ratio.
pub fn scaled_canvas_size(dims: Dimensions) -> (u32, u32) {
    let canvas = MODEL_CANVAS_SIZE as f32;
    let scale = (canvas / dims.width as f32).min(canvas / dims.height as f32);
    let scaled_width = (dims.width as f32 * scale).round().clamp(0.0, canvas) as u32;
    let scaled_height = (dims.height as f32 * scale).round().clamp(0.0, canvas) as u32;
    (scaled_width, scaled_height)
}

/// The centered rectangle the letterboxed image occupies on the model canvas.
pub fn letterbox_box(dims: Dimensions) -> FaceBox {
    let (scaled_width, scaled_height) = scaled_canvas_size(dims);
    FaceBox {
        x: (MODEL_CANVAS_SIZE - scaled_width) as f32 / 2.0,
        y: (MODEL_CANVAS_SIZE - scaled_height) as f32 / 2.0,
        width: scaled_width as f32,
        height: scaled_height as f32,
    }
}

/// Remap a detection from the `in_box` frame to the `to_box` frame:
/// translate into the target origin, then scale by the frame ratio. Box
/// extent scales without translating.
pub fn remap_detection(
    detection: &FaceDetection,
    in_box: &FaceBox,
    to_box: &FaceBox,
) -> FaceDetection {
    let scale_x = to_box.width / in_box.width;
    let scale_y = to_box.height / in_box.height;
    let dx = to_box.x - in_box.x;
    let dy = to_box.y - in_box.y;

    FaceDetection {
        bounding_box: detection
            .bounding_box
            .translated(dx, dy)
            .scaled(scale_x, scale_y),
        landmarks: detection
            .landmarks
            .map(|p| p.translated(dx, dy).scaled(scale_x, scale_y)),
    }
}
