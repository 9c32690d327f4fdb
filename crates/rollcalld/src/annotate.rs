//! Annotated group-photo archival.
//!
//! Draws classification boxes onto the recognized photo (green = identified,
//! red = unknown) and writes it under `<archive_dir>/<date>/<request_id>.png`
//! for record keeping.

use chrono::Utc;
use image::{DynamicImage, Rgb, RgbImage};
use rollcall_core::{Classification, DetectedFace};
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const IDENTIFIED_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
const UNKNOWN_COLOR: Rgb<u8> = Rgb([220, 0, 0]);
const BORDER_PX: u32 = 3;

/// Render and write the annotated copy, returning its path.
pub fn archive_annotated(
    archive_dir: &Path,
    request_id: Uuid,
    photo: &DynamicImage,
    faces: &[DetectedFace],
) -> io::Result<PathBuf> {
    let mut canvas = photo.to_rgb8();
    for face in faces {
        let color = match face.result.classification {
            Classification::Identified => IDENTIFIED_COLOR,
            Classification::Unknown => UNKNOWN_COLOR,
        };
        draw_box(&mut canvas, face, color);
    }

    let dir = archive_dir.join(Utc::now().format("%Y-%m-%d").to_string());
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{request_id}.png"));
    canvas
        .save(&path)
        .map_err(|e| io::Error::other(e.to_string()))?;

    tracing::debug!(path = %path.display(), faces = faces.len(), "annotated photo archived");
    Ok(path)
}

/// Draw a rectangular border clamped to the canvas.
fn draw_box(canvas: &mut RgbImage, face: &DetectedFace, color: Rgb<u8>) {
    let (w, h) = canvas.dimensions();
    let b = &face.bounding_box;
    let x0 = b.x.max(0.0) as u32;
    let y0 = b.y.max(0.0) as u32;
    let x1 = ((b.x + b.width) as u32).min(w.saturating_sub(1));
    let y1 = ((b.y + b.height) as u32).min(h.saturating_sub(1));
    if x1 <= x0 || y1 <= y0 {
        return;
    }

    for t in 0..BORDER_PX {
        for x in x0..=x1 {
            if y0 + t <= y1 {
                canvas.put_pixel(x, y0 + t, color);
            }
            if y1 >= t && y1 - t >= y0 {
                canvas.put_pixel(x, y1 - t, color);
            }
        }
        for y in y0..=y1 {
            if x0 + t <= x1 {
                canvas.put_pixel(x0 + t, y, color);
            }
            if x1 >= t && x1 - t >= x0 {
                canvas.put_pixel(x1 - t, y, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{BoundingBox, MatchResult};

    fn face(x: f32, y: f32, identified: bool) -> DetectedFace {
        let result = if identified {
            MatchResult {
                person_id: Some("s1".into()),
                display_name: Some("Student".into()),
                confidence: 0.9,
                classification: Classification::Identified,
            }
        } else {
            MatchResult::unknown(0.2)
        };
        DetectedFace {
            bounding_box: BoundingBox {
                x,
                y,
                width: 20.0,
                height: 20.0,
                confidence: 0.9,
            },
            result,
        }
    }

    #[test]
    fn draw_box_colors_by_classification() {
        let mut canvas = RgbImage::new(100, 100);
        draw_box(&mut canvas, &face(10.0, 10.0, true), IDENTIFIED_COLOR);
        draw_box(&mut canvas, &face(60.0, 60.0, false), UNKNOWN_COLOR);
        assert_eq!(*canvas.get_pixel(10, 10), IDENTIFIED_COLOR);
        assert_eq!(*canvas.get_pixel(60, 60), UNKNOWN_COLOR);
    }

    #[test]
    fn draw_box_out_of_bounds_is_ignored() {
        let mut canvas = RgbImage::new(50, 50);
        // Box entirely past the canvas: clamping collapses it.
        draw_box(&mut canvas, &face(200.0, 200.0, false), UNKNOWN_COLOR);
        assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }
}
