use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};

use crate::error::{IndexError, IndexResult};
use crate::inference::FACE_CROP_SIZE;
use crate::types::{DecodedImage, FaceAlignment, FaceBox, FaceDetection, Point};

/// MobileFaceNet ideal landmark positions in a 112×112 crop, divided down to
/// the unit square the fit targets.
const IDEAL_LANDMARKS: [[f64; 2]; 5] = [
    [38.2946 / 112.0, 51.6963 / 112.0],
    [73.5318 / 112.0, 51.5014 / 112.0],
    [56.0252 / 112.0, 71.7366 / 112.0],
    [41.5493 / 112.0, 92.3655 / 112.0],
    [70.7299 / 112.0, 92.2041 / 112.0],
];

const RANK_EPSILON: f64 = 1e-10;

/// Fit a 2D similarity transform (rotation, isotropic scale, translation)
/// from the detected landmarks to the ideal template, least-squares.
///
/// The whole fit runs in f64 so the resulting face ids and crops reproduce
/// across devices. Returns [`IndexError::DegenerateAlignment`] when the
/// landmarks carry no usable geometry (coincident points).
pub fn estimate_alignment(detection: &FaceDetection) -> IndexResult<FaceAlignment> {
    let from_mean = landmark_mean(&detection.landmarks);
    let to_mean = template_mean();
    let n = detection.landmarks.len() as f64;

    let mut covariance = Matrix2::<f64>::zeros();
    let mut from_var = 0.0f64;
    for (landmark, ideal) in detection.landmarks.iter().zip(IDEAL_LANDMARKS.iter()) {
        let from_d = Vector2::new(
            landmark.x as f64 - from_mean.x,
            landmark.y as f64 - from_mean.y,
        );
        let to_d = Vector2::new(ideal[0] - to_mean.x, ideal[1] - to_mean.y);
        covariance += to_d * from_d.transpose();
        from_var += from_d.dot(&from_d);
    }
    covariance /= n;
    from_var /= n;

    // Sign vector keeps the solution a proper rotation when the covariance
    // is reflection-dominated.
    let mut sign = Vector2::new(1.0f64, 1.0f64);
    if covariance.determinant() < 0.0 {
        sign[1] = -1.0;
    }

    let svd = covariance.svd(true, true);
    let u = svd.u.ok_or(IndexError::DegenerateAlignment)?;
    let v_t = svd.v_t.ok_or(IndexError::DegenerateAlignment)?;
    let singular = svd.singular_values;

    let rank = singular.iter().filter(|v| **v > RANK_EPSILON).count();
    if rank == 0 {
        return Err(IndexError::DegenerateAlignment);
    }

    let rotation = if rank == 1 {
        if u.determinant() * v_t.transpose().determinant() > 0.0 {
            u * v_t
        } else {
            u * Matrix2::new(sign[0], 0.0, 0.0, -1.0) * v_t
        }
    } else {
        u * Matrix2::new(sign[0], 0.0, 0.0, sign[1]) * v_t
    };

    if from_var <= f64::EPSILON {
        return Err(IndexError::DegenerateAlignment);
    }
    let scale = (singular[0] * sign[0] + singular[1] * sign[1]) / from_var;
    if scale.abs() < f64::EPSILON {
        return Err(IndexError::DegenerateAlignment);
    }

    let translation = to_mean - (rotation * from_mean) * scale;
    let rs = rotation * scale;
    let affine_matrix = [
        [rs[(0, 0)], rs[(0, 1)], translation[0]],
        [rs[(1, 0)], rs[(1, 1)], translation[1]],
        [0.0, 0.0, 1.0],
    ];

    // The crop covers a square of side 1/scale in source pixels, centered so
    // that the template centroid lands where the detected centroid sits.
    let size = 1.0 / scale;
    let mean_translation = (to_mean - Vector2::new(0.5, 0.5)) * size;
    let center = from_mean - mean_translation;
    let bounding_box = FaceBox {
        x: (center[0] - size / 2.0) as f32,
        y: (center[1] - size / 2.0) as f32,
        width: size as f32,
        height: size as f32,
    };

    Ok(FaceAlignment {
        affine_matrix,
        bounding_box,
    })
}

fn landmark_mean(landmarks: &[Point; 5]) -> Vector2<f64> {
    let mut sum = Vector2::new(0.0f64, 0.0f64);
    for landmark in landmarks {
        sum[0] += landmark.x as f64;
        sum[1] += landmark.y as f64;
    }
    sum / landmarks.len() as f64
}

fn template_mean() -> Vector2<f64> {
    let mut sum = Vector2::new(0.0f64, 0.0f64);
    for ideal in &IDEAL_LANDMARKS {
        sum[0] += ideal[0];
        sum[1] += ideal[1];
    }
    sum / IDEAL_LANDMARKS.len() as f64
}

/// Warp the aligned face region out of the source image into a raw 112×112
/// RGB crop: channel-last, row-major floats still in 0–255.
///
/// Output pixels map back to source coordinates through the inverse of the
/// crop-scaled affine, sampled at half-pixel centers with bilinear
/// filtering. Samples outside the image clamp to the nearest edge pixel.
pub fn warp_aligned_crop(
    image: &DecodedImage,
    alignment: &FaceAlignment,
) -> IndexResult<Vec<f32>> {
    let crop = FACE_CROP_SIZE as f64;
    let m = &alignment.affine_matrix;
    // The fit targets the unit square; scale it up to crop coordinates so
    // the inverse maps crop pixels straight onto source pixels.
    let forward = Matrix3::new(
        m[0][0] * crop,
        m[0][1] * crop,
        m[0][2] * crop,
        m[1][0] * crop,
        m[1][1] * crop,
        m[1][2] * crop,
        m[2][0],
        m[2][1],
        m[2][2],
    );
    let inverse = forward
        .try_inverse()
        .ok_or(IndexError::DegenerateAlignment)?;

    let mut out = Vec::with_capacity(FACE_CROP_SIZE * FACE_CROP_SIZE * 3);
    for v in 0..FACE_CROP_SIZE {
        for u in 0..FACE_CROP_SIZE {
            let src = inverse * Vector3::new(u as f64 + 0.5, v as f64 + 0.5, 1.0);
            let rgb = sample_bilinear(image, src[0] as f32, src[1] as f32);
            out.extend_from_slice(&rgb);
        }
    }
    Ok(out)
}

/// Map raw 0–255 crop values into the embedder's input range, appending to
/// the batch buffer.
pub fn normalize_for_embedding(raw_crop: &[f32], out: &mut Vec<f32>) {
    for &value in raw_crop {
        out.push(value / 127.5 - 1.0);
    }
}

fn sample_bilinear(image: &DecodedImage, fx: f32, fy: f32) -> [f32; 3] {
    let max_x = (image.dimensions.width - 1) as f32;
    let max_y = (image.dimensions.height - 1) as f32;
    let fx = fx.clamp(0.0, max_x);
    let fy = fy.clamp(0.0, max_y);

    let x0 = fx.floor() as u32;
    let x1 = fx.ceil() as u32;
    let y0 = fy.floor() as u32;
    let y1 = fy.ceil() as u32;
    let dx = fx - x0 as f32;
    let dy = fy - y0 as f32;
    let dx1 = 1.0 - dx;
    let dy1 = 1.0 - dy;

    let p1 = image.rgb_at(x0, y0);
    let p2 = image.rgb_at(x1, y0);
    let p3 = image.rgb_at(x0, y1);
    let p4 = image.rgb_at(x1, y1);

    let blend = |v1: f32, v2: f32, v3: f32, v4: f32| -> f32 {
        v1 * dx1 * dy1 + v2 * dx * dy1 + v3 * dx1 * dy + v4 * dx * dy
    };

    [
        blend(p1[0], p2[0], p3[0], p4[0]),
        blend(p1[1], p2[1], p3[1], p4[1]),
        blend(p1[2], p2[2], p3[2], p4[2]),
    ]
}
