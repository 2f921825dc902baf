use crate::error::{IndexError, IndexResult};
use crate::face::detect;
use crate::inference::MODEL_CANVAS_SIZE;
use crate::types::Dimensions;

/// Fill value for canvas pixels the letterboxed image does not cover, on the
/// 0–255 scale. Matches what the detector was trained with.
const PAD_VALUE: f32 = 114.0;

/// Letterbox the RGBA source onto the center of the model canvas and emit
/// the NCHW float tensor the detector expects, channels scaled to 0–1.
pub(crate) fn letterbox_to_canvas(rgba: &[u8], dims: Dimensions) -> IndexResult<Vec<f32>> {
    if dims.width == 0 || dims.height == 0 {
        return Err(IndexError::InvalidImage(
            "image dimensions cannot be zero".to_string(),
        ));
    }
    let expected = dims.width as usize * dims.height as usize * 4;
    if rgba.len() != expected {
        return Err(IndexError::InvalidImage(format!(
            "RGBA buffer length {} does not match {}x{}",
            rgba.len(),
            dims.width,
            dims.height
        )));
    }

    let canvas = MODEL_CANVAS_SIZE as usize;
    let canvas_f = MODEL_CANVAS_SIZE as f32;
    let scale = (canvas_f / dims.width as f32).min(canvas_f / dims.height as f32);
    let (scaled_width, scaled_height) = detect::scaled_canvas_size(dims);
    let offset_x = (canvas_f - scaled_width as f32) / 2.0;
    let offset_y = (canvas_f - scaled_height as f32) / 2.0;

    let mut output = vec![0f32; 3 * canvas * canvas];
    let green_offset = canvas * canvas;
    let blue_offset = 2 * canvas * canvas;

    for y in 0..canvas {
        for x in 0..canvas {
            let cx = x as f32 - offset_x;
            let cy = y as f32 - offset_y;
            let rgb = if cx < 0.0
                || cy < 0.0
                || cx >= scaled_width as f32
                || cy >= scaled_height as f32
            {
                [PAD_VALUE, PAD_VALUE, PAD_VALUE]
            } else {
                sample_bilinear(rgba, dims, cx / scale, cy / scale)
            };
            let idx = y * canvas + x;
            output[idx] = rgb[0] / 255.0;
            output[idx + green_offset] = rgb[1] / 255.0;
            output[idx + blue_offset] = rgb[2] / 255.0;
        }
    }

    Ok(output)
}

fn sample_bilinear(rgba: &[u8], dims: Dimensions, fx: f32, fy: f32) -> [f32; 3] {
    let x0 = fx.floor() as i32;
    let x1 = fx.ceil() as i32;
    let y0 = fy.floor() as i32;
    let y1 = fy.ceil() as i32;
    let dx = fx - x0 as f32;
    let dy = fy - y0 as f32;
    let dx1 = 1.0 - dx;
    let dy1 = 1.0 - dy;

    let p1 = read_rgb(rgba, dims, x0, y0);
    let p2 = read_rgb(rgba, dims, x1, y0);
    let p3 = read_rgb(rgba, dims, x0, y1);
    let p4 = read_rgb(rgba, dims, x1, y1);

    let blend = |v1: f32, v2: f32, v3: f32, v4: f32| -> f32 {
        v1 * dx1 * dy1 + v2 * dx * dy1 + v3 * dx1 * dy + v4 * dx * dy
    };

    [
        blend(p1[0], p2[0], p3[0], p4[0]),
        blend(p1[1], p2[1], p3[1], p4[1]),
        blend(p1[2], p2[2], p3[2], p4[2]),
    ]
}

fn read_rgb(rgba: &[u8], dims: Dimensions, x: i32, y: i32) -> [f32; 3] {
    if x < 0 || y < 0 || x >= dims.width as i32 || y >= dims.height as i32 {
        return [PAD_VALUE, PAD_VALUE, PAD_VALUE];
    }
    let idx = (y as usize * dims.width as usize + x as usize) * 4;
    [
        rgba[idx] as f32,
        rgba[idx + 1] as f32,
        rgba[idx + 2] as f32,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_image_pads_the_top_and_bottom_bands() {
        let dims = Dimensions {
            width: 800,
            height: 400,
        };
        let rgba = vec![255u8; 800 * 400 * 4];
        let tensor = letterbox_to_canvas(&rgba, dims).expect("preprocess succeeds");

        let canvas = MODEL_CANVAS_SIZE as usize;
        assert_eq!(tensor.len(), 3 * canvas * canvas);

        let pad = PAD_VALUE / 255.0;
        // 800x400 scales to 640x320, centered: rows 0..160 and 480..640 pad.
        assert!((tensor[10 * canvas + 320] - pad).abs() < 1e-6);
        assert!((tensor[620 * canvas + 320] - pad).abs() < 1e-6);
        assert!((tensor[320 * canvas + 320] - 1.0).abs() < 1e-6);
        // Same pixel, green and blue planes.
        assert!((tensor[canvas * canvas + 320 * canvas + 320] - 1.0).abs() < 1e-6);
        assert!((tensor[2 * canvas * canvas + 320 * canvas + 320] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let dims = Dimensions {
            width: 0,
            height: 32,
        };
        assert!(matches!(
            letterbox_to_canvas(&[], dims),
            Err(IndexError::InvalidImage(_))
        ));
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let dims = Dimensions {
            width: 16,
            height: 16,
        };
        assert!(matches!(
            letterbox_to_canvas(&[0u8; 16], dims),
            Err(IndexError::InvalidImage(_))
        ));
    }
}
