use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image as FirImage, ImageRef as FirImageRef},
};
use image::{ColorType, ImageEncoder, codecs::jpeg::JpegEncoder};

use crate::error::{IndexError, IndexResult};
use crate::types::{DecodedImage, FaceBox};

const JPEG_QUALITY: u8 = 90;
/// Padding added around the face box, as a fraction of the box extent.
const REGULAR_PADDING: f64 = 0.4;
/// Padding kept when the padded crop overshoots an image edge.
const MINIMUM_PADDING: f64 = 0.1;

#[derive(Clone, Debug)]
struct CropRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    output_width: u32,
    output_height: u32,
}

/// Padded JPEG crops for the faces of one image, one per normalized box, in
/// input order. Gallery material; not part of the index itself.
pub fn face_thumbnails(
    image: &DecodedImage,
    face_boxes: &[FaceBox],
) -> IndexResult<Vec<Vec<u8>>> {
    if face_boxes.is_empty() {
        return Ok(Vec::new());
    }
    image.validate()?;

    let source = FirImageRef::new(
        image.dimensions.width,
        image.dimensions.height,
        image.rgba.as_slice(),
        PixelType::U8x4,
    )
    .map_err(|e| IndexError::Thumbnail(format!("invalid RGBA source buffer: {e}")))?;

    let mut resizer = Resizer::new();
    let image_width = image.dimensions.width as f64;
    let image_height = image.dimensions.height as f64;
    let mut thumbnails = Vec::with_capacity(face_boxes.len());

    for (index, face_box) in face_boxes.iter().enumerate() {
        let crop = padded_crop_rect(face_box, image_width, image_height).map_err(|e| {
            IndexError::Thumbnail(format!("invalid face box at index {index}: {e}"))
        })?;

        let mut resized = FirImage::new(crop.output_width, crop.output_height, PixelType::U8x4);
        let options = ResizeOptions::new()
            .crop(crop.x, crop.y, crop.width, crop.height)
            .resize_alg(ResizeAlg::Convolution(filter_for(&crop)));
        resizer
            .resize(&source, &mut resized, Some(&options))
            .map_err(|e| IndexError::Thumbnail(format!("failed to resize face crop: {e}")))?;

        thumbnails.push(encode_jpeg(
            resized.buffer(),
            crop.output_width,
            crop.output_height,
        )?);
    }

    Ok(thumbnails)
}

fn padded_crop_rect(
    face_box: &FaceBox,
    image_width: f64,
    image_height: f64,
) -> Result<CropRect, String> {
    if ![face_box.x, face_box.y, face_box.width, face_box.height]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err("non-finite values are not allowed".to_string());
    }

    let width_abs = face_box.width as f64 * image_width;
    let height_abs = face_box.height as f64 * image_height;
    if width_abs <= 0.0 || height_abs <= 0.0 {
        return Err("face box extent must be positive".to_string());
    }

    let (x, width) = padded_axis(face_box.x as f64 * image_width, width_abs, image_width);
    let (y, height) = padded_axis(face_box.y as f64 * image_height, height_abs, image_height);

    let output_width = width as u32;
    let output_height = height as u32;
    if output_width == 0 || output_height == 0 {
        return Err(format!(
            "crop resolves to a zero-sized output ({output_width}x{output_height})"
        ));
    }

    Ok(CropRect {
        x,
        y,
        width,
        height,
        output_width,
        output_height,
    })
}

// One axis of the padded crop. Pad by the regular fraction on both sides;
// when the padded start would fall outside the image, give the overshoot
// back from both sides, keeping at least the minimum padding, then clamp to
// what the image can actually supply.
fn padded_axis(min_abs: f64, extent_abs: f64, image_extent: f64) -> (f64, f64) {
    let padded_start = min_abs - extent_abs * REGULAR_PADDING;
    let overshoot = (-padded_start).max(0.0) / extent_abs;
    let kept_padding = REGULAR_PADDING - overshoot.min(REGULAR_PADDING - MINIMUM_PADDING);
    let padded_extent = extent_abs * (1.0 + 2.0 * kept_padding);

    let start = padded_start.clamp(0.0, image_extent);
    let extent = padded_extent.clamp(0.0, (image_extent - start).max(0.0));
    (start, extent)
}

fn filter_for(crop: &CropRect) -> FilterType {
    // Heavier downscales need stronger antialiasing.
    let scale = (crop.width / f64::from(crop.output_width))
        .max(crop.height / f64::from(crop.output_height));
    match scale {
        s if s <= 1.15 => FilterType::Bilinear,
        s if s <= 1.5 => FilterType::Mitchell,
        _ => FilterType::Lanczos3,
    }
}

fn encode_jpeg(rgba: &[u8], width: u32, height: u32) -> IndexResult<Vec<u8>> {
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for pixel in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&pixel[..3]);
    }

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY)
        .write_image(&rgb, width, height, ColorType::Rgb8.into())
        .map_err(|e| IndexError::Thumbnail(format!("failed to encode JPEG: {e}")))?;
    Ok(encoded)
}
