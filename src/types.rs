use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

/// A 2D coordinate. Whether it is in source pixels, model-canvas pixels or in
/// the unit square depends on the frame of the record holding it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn scaled(self, scale_x: f32, scale_y: f32) -> Self {
        Self {
            x: self.x * scale_x,
            y: self.y * scale_y,
        }
    }

    pub fn translated(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Axis-aligned box with a top-left origin. Width and height are strictly
/// positive for valid detections.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceBox {
    /// Scales origin and extent. Origin-preserving only when the origin is 0.
    pub fn scaled(self, scale_x: f32, scale_y: f32) -> Self {
        Self {
            x: self.x * scale_x,
            y: self.y * scale_y,
            width: self.width * scale_x,
            height: self.height * scale_y,
        }
    }

    pub fn translated(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    /// Divides pixel coordinates by the image dimensions. Does not clamp.
    pub fn normalized(self, dims: Dimensions) -> Self {
        self.scaled(1.0 / dims.width as f32, 1.0 / dims.height as f32)
    }
}

/// Source image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Raw RGBA pixels of one photograph, row-major, `width * height * 4` bytes.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub dimensions: Dimensions,
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    pub fn new(dimensions: Dimensions, rgba: Vec<u8>) -> IndexResult<Self> {
        let image = Self { dimensions, rgba };
        image.validate()?;
        Ok(image)
    }

    pub fn validate(&self) -> IndexResult<()> {
        if self.dimensions.width == 0 || self.dimensions.height == 0 {
            return Err(IndexError::InvalidImage(
                "image dimensions cannot be zero".to_string(),
            ));
        }
        let expected = self.dimensions.width as usize * self.dimensions.height as usize * 4;
        if self.rgba.len() != expected {
            return Err(IndexError::InvalidImage(format!(
                "RGBA buffer length {} does not match {}x{}",
                self.rgba.len(),
                self.dimensions.width,
                self.dimensions.height
            )));
        }
        Ok(())
    }

    /// RGB value of the pixel at `(x, y)`. Callers keep coordinates in range.
    pub(crate) fn rgb_at(&self, x: u32, y: u32) -> [f32; 3] {
        let idx = (y as usize * self.dimensions.width as usize + x as usize) * 4;
        [
            self.rgba[idx] as f32,
            self.rgba[idx + 1] as f32,
            self.rgba[idx + 2] as f32,
        ]
    }
}

/// One detected face. Landmark order is fixed:
/// [left_eye, right_eye, nose, left_mouth, right_mouth], in the same frame as
/// the box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    #[serde(rename = "box")]
    pub bounding_box: FaceBox,
    pub landmarks: [Point; 5],
}

impl FaceDetection {
    /// Box and landmarks divided by the image dimensions.
    pub fn normalized(&self, dims: Dimensions) -> Self {
        let scale_x = 1.0 / dims.width as f32;
        let scale_y = 1.0 / dims.height as f32;
        Self {
            bounding_box: self.bounding_box.scaled(scale_x, scale_y),
            landmarks: self.landmarks.map(|p| p.scaled(scale_x, scale_y)),
        }
    }
}

/// Detection plus the detector confidence, before the face record is
/// assembled.
#[derive(Clone, Debug)]
pub struct ScoredDetection {
    pub detection: FaceDetection,
    pub score: f32,
}

/// Result of fitting a face to the embedding model's landmark template.
///
/// `affine_matrix` maps source-image pixel coordinates into the unit-square
/// crop frame (the warp scales it up to the 112×112 crop). `bounding_box` is
/// the square in source coordinates the crop covers.
#[derive(Clone, Debug)]
pub struct FaceAlignment {
    pub affine_matrix: [[f64; 3]; 3],
    pub bounding_box: FaceBox,
}

/// One face of a [`FaceIndex`]. The detection is normalized to the unit
/// square by the source image dimensions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Face {
    #[serde(rename = "faceID")]
    pub face_id: String,
    pub detection: FaceDetection,
    pub score: f32,
    pub blur: f32,
    pub embedding: Vec<f32>,
}

/// The per-image record produced by the pipeline. Immutable once returned;
/// faces keep the order in which the detector emitted them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceIndex {
    pub width: u32,
    pub height: u32,
    pub faces: Vec<Face>,
}

/// Deterministic face identifier: file id plus the four normalized box edges,
/// each rendered as five fraction digits. Stable across reindexing, so
/// cluster membership survives transport between devices.
pub fn make_face_id(file_id: i64, bounding_box: &FaceBox, dims: Dimensions) -> String {
    let width = dims.width as f64;
    let height = dims.height as f64;
    let x_min = face_id_segment(bounding_box.x as f64 / width);
    let y_min = face_id_segment(bounding_box.y as f64 / height);
    let x_max = face_id_segment((bounding_box.x + bounding_box.width) as f64 / width);
    let y_max = face_id_segment((bounding_box.y + bounding_box.height) as f64 / height);
    format!("{file_id}_{x_min}_{y_min}_{x_max}_{y_max}")
}

// Six decimal digits rendered, five kept: the fractional part is truncated
// rather than rounded, so a coordinate clamped to 0.999999 renders "99999",
// never "00000". Rendering first keeps 0.6 at "60000" despite its binary
// representation sitting just below 0.6.
fn face_id_segment(value: f64) -> String {
    let clamped = value.clamp(0.0, 0.999_999);
    let fixed = format!("{clamped:.6}");
    fixed[2..7].to_string()
}

/// Parses the file id prefix back out of a face id. Returns `None` on
/// malformed input instead of failing the caller.
pub fn file_id_from_face_id(face_id: &str) -> Option<i64> {
    let parsed = face_id
        .split_once('_')
        .and_then(|(prefix, _)| prefix.parse::<i64>().ok());
    if parsed.is_none() {
        tracing::warn!(face_id, "face id has no parseable file id prefix");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn face_id_renders_five_fraction_digits_per_edge() {
        let bounding_box = FaceBox {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
        };
        assert_eq!(
            make_face_id(42, &bounding_box, dims(100, 100)),
            "42_10000_20000_40000_60000"
        );
    }

    #[test]
    fn face_id_clamps_overflowing_edges() {
        let bounding_box = FaceBox {
            x: 99.0,
            y: 0.0,
            width: 10.0,
            height: 50.0,
        };
        let id = make_face_id(7, &bounding_box, dims(100, 100));
        assert_eq!(id, "7_99000_00000_99999_50000");
    }

    #[test]
    fn face_id_matches_shape_for_arbitrary_boxes() {
        let boxes = [
            FaceBox {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            },
            FaceBox {
                x: 123.4,
                y: 567.8,
                width: 90.1,
                height: 23.4,
            },
            FaceBox {
                x: 999.0,
                y: 999.0,
                width: 500.0,
                height: 500.0,
            },
        ];
        for bounding_box in boxes {
            let id = make_face_id(314159, &bounding_box, dims(1000, 1000));
            let mut parts = id.split('_');
            let prefix = parts.next().expect("id has a prefix");
            assert!(prefix.chars().all(|c| c.is_ascii_digit()));
            let segments: Vec<_> = parts.collect();
            assert_eq!(segments.len(), 4);
            for segment in segments {
                assert_eq!(segment.len(), 5);
                assert!(segment.chars().all(|c| c.is_ascii_digit()));
            }
        }
    }

    #[test]
    fn file_id_round_trips_through_face_id() {
        for file_id in [0i64, 1, 42, 987654321] {
            let bounding_box = FaceBox {
                x: 12.0,
                y: 34.0,
                width: 56.0,
                height: 78.0,
            };
            let id = make_face_id(file_id, &bounding_box, dims(200, 300));
            assert_eq!(file_id_from_face_id(&id), Some(file_id));
        }
    }

    #[test]
    fn file_id_parse_is_non_fatal_on_garbage() {
        assert_eq!(file_id_from_face_id("not-an-id"), None);
        assert_eq!(file_id_from_face_id("abc_10000_20000_30000_40000"), None);
        assert_eq!(file_id_from_face_id(""), None);
    }

    #[test]
    fn box_normalization_divides_by_dims() {
        let bounding_box = FaceBox {
            x: 50.0,
            y: 25.0,
            width: 100.0,
            height: 75.0,
        };
        let normalized = bounding_box.normalized(dims(200, 100));
        assert_eq!(normalized.x, 0.25);
        assert_eq!(normalized.y, 0.25);
        assert_eq!(normalized.width, 0.5);
        assert_eq!(normalized.height, 0.75);
    }

    #[test]
    fn detection_normalization_covers_landmarks() {
        let detection = FaceDetection {
            bounding_box: FaceBox {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 50.0,
            },
            landmarks: [Point { x: 10.0, y: 20.0 }; 5],
        };
        let normalized = detection.normalized(dims(100, 50));
        for landmark in normalized.landmarks {
            assert_eq!(landmark.x, 0.1);
            assert_eq!(landmark.y, 0.4);
        }
    }

    #[test]
    fn decoded_image_rejects_mismatched_buffer() {
        assert!(DecodedImage::new(dims(2, 2), vec![0u8; 16]).is_ok());
        assert!(DecodedImage::new(dims(2, 2), vec![0u8; 15]).is_err());
        assert!(DecodedImage::new(dims(0, 2), vec![]).is_err());
    }
}
