//! Grayscale frame preprocessing: decode, downscale, crop, resize.

use image::DynamicImage;
use rollcall_core::{BoundingBox, CodecError, Frame};

/// Largest dimension an uploaded photo is kept at before detection.
/// Enrollment selfies and class photos arrive at phone-camera resolutions;
/// detection quality saturates well below that.
pub const MAX_IMAGE_DIM: u32 = 1024;

/// Decode raw upload bytes into a pixel image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    image::load_from_memory(bytes).map_err(|e| CodecError::Unprocessable(e.to_string()))
}

/// Downscale so the largest dimension is at most `max_dim`, keeping aspect.
pub fn downscale(img: DynamicImage, max_dim: u32) -> DynamicImage {
    if img.width().max(img.height()) <= max_dim {
        return img;
    }
    img.resize(max_dim, max_dim, image::imageops::FilterType::Triangle)
}

/// Flatten to the single-channel frame the codec models consume.
pub fn to_frame(img: &DynamicImage) -> Frame {
    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();
    Frame::new(gray.into_raw(), width, height)
}

/// Bilinear resize of a grayscale frame.
pub fn resize_bilinear(src: &Frame, dst_w: u32, dst_h: u32) -> Frame {
    let mut out = vec![0u8; (dst_w * dst_h) as usize];
    let sx = src.width as f32 / dst_w as f32;
    let sy = src.height as f32 / dst_h as f32;

    for dy in 0..dst_h {
        let fy = (dy as f32 + 0.5) * sy - 0.5;
        let y0 = fy.floor().clamp(0.0, (src.height - 1) as f32) as u32;
        let y1 = (y0 + 1).min(src.height - 1);
        let wy = (fy - y0 as f32).clamp(0.0, 1.0);

        for dx in 0..dst_w {
            let fx = (dx as f32 + 0.5) * sx - 0.5;
            let x0 = fx.floor().clamp(0.0, (src.width - 1) as f32) as u32;
            let x1 = (x0 + 1).min(src.width - 1);
            let wx = (fx - x0 as f32).clamp(0.0, 1.0);

            let p = |x: u32, y: u32| src.data[(y * src.width + x) as usize] as f32;
            let top = p(x0, y0) * (1.0 - wx) + p(x1, y0) * wx;
            let bottom = p(x0, y1) * (1.0 - wx) + p(x1, y1) * wx;
            out[(dy * dst_w + dx) as usize] = (top * (1.0 - wy) + bottom * wy).round() as u8;
        }
    }

    Frame::new(out, dst_w, dst_h)
}

/// Crop a square region centered on the face box, expanded by `margin`
/// (fraction of the box's larger side) and clamped to the frame.
pub fn square_crop(frame: &Frame, face: &BoundingBox, margin: f32) -> Frame {
    let side = face.width.max(face.height) * (1.0 + margin);
    let cx = face.x + face.width / 2.0;
    let cy = face.y + face.height / 2.0;

    let half = side / 2.0;
    let x0 = (cx - half).max(0.0) as u32;
    let y0 = (cy - half).max(0.0) as u32;
    let x1 = (cx + half).min(frame.width as f32) as u32;
    let y1 = (cy + half).min(frame.height as f32) as u32;

    let w = (x1.saturating_sub(x0)).max(1);
    let h = (y1.saturating_sub(y0)).max(1);

    let mut data = Vec::with_capacity((w * h) as usize);
    for y in y0..y0 + h {
        let row = (y * frame.width + x0) as usize;
        data.extend_from_slice(&frame.data[row..row + w as usize]);
    }
    Frame::new(data, w, h)
}
