use crate::inference::FACE_CROP_SIZE;
use crate::types::Point;

/// Total columns removed from the crop before the Laplacian pass. Which side
/// they come from depends on where the face is pointing.
const REMOVE_SIDE_COLUMNS: usize = 56;

const LAPLACIAN_KERNEL: [[i32; 3]; 3] = [[0, 1, 0], [1, -4, 1], [0, 1, 0]];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum FaceDirection {
    Left,
    Right,
    Straight,
}

/// Blur score for one aligned face: variance of the Laplacian over the
/// direction-cropped, reflection-padded luminance of the raw 112×112 crop.
/// Larger means sharper.
pub fn compute_blur(raw_crop: &[f32], landmarks: &[Point; 5]) -> f32 {
    let gray = luminance_matrix(raw_crop);
    let laplacian = apply_laplacian(&gray, face_direction(landmarks));
    matrix_variance(&laplacian)
}

fn luminance_matrix(raw_crop: &[f32]) -> Vec<Vec<i32>> {
    let mut gray = vec![vec![0i32; FACE_CROP_SIZE]; FACE_CROP_SIZE];
    for (y, row) in gray.iter_mut().enumerate() {
        for (x, value) in row.iter_mut().enumerate() {
            let idx = (y * FACE_CROP_SIZE + x) * 3;
            let luma =
                0.299 * raw_crop[idx] + 0.587 * raw_crop[idx + 1] + 0.114 * raw_crop[idx + 2];
            *value = luma.round().clamp(0.0, 255.0) as i32;
        }
    }
    gray
}

pub(crate) fn face_direction(landmarks: &[Point; 5]) -> FaceDirection {
    let [left_eye, right_eye, nose, left_mouth, right_mouth] = *landmarks;

    let eye_distance_x = (right_eye.x - left_eye.x).abs();
    let eye_distance_y = (right_eye.y - left_eye.y).abs();
    let mouth_distance_y = (right_mouth.y - left_mouth.y).abs();

    let face_is_upright = left_eye.y.max(right_eye.y) + 0.5 * eye_distance_y < nose.y
        && nose.y + 0.5 * mouth_distance_y < left_mouth.y.min(right_mouth.y);

    let nose_sticking_out_left =
        nose.x < left_eye.x.min(right_eye.x) && nose.x < left_mouth.x.min(right_mouth.x);
    let nose_sticking_out_right =
        nose.x > left_eye.x.max(right_eye.x) && nose.x > left_mouth.x.max(right_mouth.x);

    let nose_close_to_left_eye = (nose.x - left_eye.x).abs() < 0.2 * eye_distance_x;
    let nose_close_to_right_eye = (nose.x - right_eye.x).abs() < 0.2 * eye_distance_x;

    if nose_sticking_out_left || (face_is_upright && nose_close_to_left_eye) {
        FaceDirection::Left
    } else if nose_sticking_out_right || (face_is_upright && nose_close_to_right_eye) {
        FaceDirection::Right
    } else {
        FaceDirection::Straight
    }
}

fn apply_laplacian(image: &[Vec<i32>], direction: FaceDirection) -> Vec<Vec<i32>> {
    let padded = pad_for_direction(image, direction);
    let rows = padded.len().saturating_sub(2);
    let cols = padded
        .first()
        .map(|row| row.len().saturating_sub(2))
        .unwrap_or(0);
    let mut out = vec![vec![0i32; cols]; rows];

    for i in 0..rows {
        for j in 0..cols {
            let mut sum = 0i32;
            for (ki, kernel_row) in LAPLACIAN_KERNEL.iter().enumerate() {
                for (kj, weight) in kernel_row.iter().enumerate() {
                    sum += padded[i + ki][j + kj] * weight;
                }
            }
            out[i][j] = sum;
        }
    }
    out
}

// One-step reflection padding around the direction-cropped strip. The border
// mirrors the *second* inner row/column (`padded[2]`, `padded[n - 3]`), and
// the padded width is `cols + 2 - 56` before the strip copy; both quirks are
// load-bearing for score compatibility with other producers.
fn pad_for_direction(image: &[Vec<i32>], direction: FaceDirection) -> Vec<Vec<i32>> {
    let rows = image.len();
    let cols = image.first().map(|row| row.len()).unwrap_or(0);
    let padded_cols = cols + 2 - REMOVE_SIDE_COLUMNS;
    let padded_rows = rows + 2;
    let mut padded = vec![vec![0i32; padded_cols]; padded_rows];

    let start_col = match direction {
        FaceDirection::Straight => REMOVE_SIDE_COLUMNS / 2,
        FaceDirection::Left => REMOVE_SIDE_COLUMNS,
        FaceDirection::Right => 0,
    };
    let copy_cols = padded_cols.saturating_sub(2);

    for i in 0..rows {
        for j in 0..copy_cols {
            padded[i + 1][j + 1] = image[i][j + start_col];
        }
    }

    for j in 1..=copy_cols {
        padded[0][j] = padded[2][j];
        padded[rows + 1][j] = padded[rows - 1][j];
    }
    for row in padded.iter_mut() {
        row[0] = row[2];
        row[padded_cols - 1] = row[padded_cols - 3];
    }

    padded
}

// Population variance, accumulated in f64 in row-major order. The summation
// order is fixed; scores must reproduce bit-for-bit across producers.
fn matrix_variance(matrix: &[Vec<i32>]) -> f32 {
    if matrix.is_empty() || matrix[0].is_empty() {
        return 0.0;
    }

    let count = (matrix.len() * matrix[0].len()) as f64;

    let mut mean = 0.0f64;
    for row in matrix {
        for value in row {
            mean += *value as f64;
        }
    }
    mean /= count;

    let mut variance = 0.0f64;
    for row in matrix {
        for value in row {
            let diff = *value as f64 - mean;
            variance += diff * diff;
        }
    }
    (variance / count) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crop_from_gray(gray: &[Vec<i32>]) -> Vec<f32> {
        let mut crop = Vec::with_capacity(FACE_CROP_SIZE * FACE_CROP_SIZE * 3);
        for row in gray {
            for &value in row {
                let v = value as f32;
                crop.extend_from_slice(&[v, v, v]);
            }
        }
        crop
    }

    fn straight_landmarks() -> [Point; 5] {
        [
            Point { x: 0.3, y: 0.3 },
            Point { x: 0.7, y: 0.3 },
            Point { x: 0.5, y: 0.55 },
            Point { x: 0.35, y: 0.8 },
            Point { x: 0.65, y: 0.8 },
        ]
    }

    #[test]
    fn constant_crop_has_zero_blur() {
        let crop = vec![128.0f32; FACE_CROP_SIZE * FACE_CROP_SIZE * 3];
        assert_eq!(compute_blur(&crop, &straight_landmarks()), 0.0);
    }

    #[test]
    fn nose_near_left_eye_on_an_upright_face_reads_left() {
        let landmarks = [
            Point { x: 0.3, y: 0.3 },
            Point { x: 0.7, y: 0.3 },
            Point { x: 0.31, y: 0.55 },
            Point { x: 0.35, y: 0.8 },
            Point { x: 0.65, y: 0.8 },
        ];
        assert_eq!(face_direction(&landmarks), FaceDirection::Left);
    }

    #[test]
    fn nose_sticking_out_right_reads_right_even_tilted() {
        // Not upright (nose above the eye band), but the nose clears both
        // eyes and both mouth corners on the x axis.
        let landmarks = [
            Point { x: 0.3, y: 0.5 },
            Point { x: 0.6, y: 0.5 },
            Point { x: 0.75, y: 0.45 },
            Point { x: 0.35, y: 0.7 },
            Point { x: 0.6, y: 0.7 },
        ];
        assert_eq!(face_direction(&landmarks), FaceDirection::Right);
    }

    #[test]
    fn centered_nose_reads_straight() {
        assert_eq!(face_direction(&straight_landmarks()), FaceDirection::Straight);
    }

    #[test]
    fn padding_keeps_one_extra_column_and_reflects_one_step() {
        let gray = vec![vec![7i32; FACE_CROP_SIZE]; FACE_CROP_SIZE];
        let padded = pad_for_direction(&gray, FaceDirection::Straight);
        assert_eq!(padded.len(), FACE_CROP_SIZE + 2);
        assert_eq!(padded[0].len(), FACE_CROP_SIZE + 2 - REMOVE_SIDE_COLUMNS);

        let mut gradient = vec![vec![0i32; FACE_CROP_SIZE]; FACE_CROP_SIZE];
        for (y, row) in gradient.iter_mut().enumerate() {
            for (x, value) in row.iter_mut().enumerate() {
                *value = (y * FACE_CROP_SIZE + x) as i32;
            }
        }
        let padded = pad_for_direction(&gradient, FaceDirection::Straight);
        let cols = padded[0].len();
        // Border row/column mirror the second inner row/column.
        assert_eq!(padded[0][1], padded[2][1]);
        assert_eq!(padded[FACE_CROP_SIZE + 1][1], padded[FACE_CROP_SIZE - 1][1]);
        assert_eq!(padded[3][0], padded[3][2]);
        assert_eq!(padded[3][cols - 1], padded[3][cols - 3]);
    }

    #[test]
    fn direction_selects_which_columns_survive() {
        // Busy left half, flat right half: a left-facing crop (which keeps
        // only the right half) scores zero, a straight crop does not.
        let mut gray = vec![vec![50i32; FACE_CROP_SIZE]; FACE_CROP_SIZE];
        for row in gray.iter_mut() {
            for x in 0..FACE_CROP_SIZE / 2 {
                row[x] = if x % 2 == 0 { 0 } else { 200 };
            }
        }
        let crop = crop_from_gray(&gray);

        let left_landmarks = [
            Point { x: 0.3, y: 0.3 },
            Point { x: 0.7, y: 0.3 },
            Point { x: 0.31, y: 0.55 },
            Point { x: 0.35, y: 0.8 },
            Point { x: 0.65, y: 0.8 },
        ];
        assert_eq!(compute_blur(&crop, &left_landmarks), 0.0);
        assert!(compute_blur(&crop, &straight_landmarks()) > 0.0);
    }

    #[test]
    fn sharp_edges_score_higher_than_smooth_ramps() {
        let mut sharp = vec![vec![0i32; FACE_CROP_SIZE]; FACE_CROP_SIZE];
        let mut smooth = vec![vec![0i32; FACE_CROP_SIZE]; FACE_CROP_SIZE];
        for y in 0..FACE_CROP_SIZE {
            for x in 0..FACE_CROP_SIZE {
                sharp[y][x] = if x < FACE_CROP_SIZE / 2 { 0 } else { 255 };
                smooth[y][x] = (x * 255 / (FACE_CROP_SIZE - 1)) as i32;
            }
        }
        let sharp_score = compute_blur(&crop_from_gray(&sharp), &straight_landmarks());
        let smooth_score = compute_blur(&crop_from_gray(&smooth), &straight_landmarks());
        assert!(sharp_score > smooth_score);
        assert!(smooth_score >= 0.0);
    }

    #[test]
    fn single_bright_pixel_has_known_variance() {
        // A lone bright pixel inside the kept strip produces the kernel
        // itself as the Laplacian response: one -4v and four 1v taps.
        let mut gray = vec![vec![0i32; FACE_CROP_SIZE]; FACE_CROP_SIZE];
        gray[56][56] = 100;
        let laplacian = apply_laplacian(&gray, FaceDirection::Straight);

        let rows = laplacian.len() as f64;
        let cols = laplacian[0].len() as f64;
        let count = rows * cols;
        let sum = (4.0 * 100.0) - 400.0;
        let mean = sum / count;
        assert_eq!(mean, 0.0);
        let expected = (4.0 * 100.0f64.powi(2) + 400.0f64.powi(2)) / count;
        let variance = matrix_variance(&laplacian) as f64;
        assert!((variance - expected).abs() < 1e-3, "{variance} vs {expected}");
    }
}
