use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{imageops, ImageFormat, Rgba, RgbaImage};
use thiserror::Error;

use crate::geometry::{PixelPoint, Rect};
use crate::layout::Viewport;

pub type Colour = [u8; 4];

pub const TRANSPARENT: Colour = [0, 0, 0, 0];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to encode frame as png: {0}")]
    Png(#[from] image::ImageError),
}

/// Three stacked surfaces: static board, per-turn tokens and routes, and
/// move options drawn on top.
#[derive(Debug, Clone)]
pub struct LayeredFrame {
    pub background: RgbaImage,
    pub turn: RgbaImage,
    pub moves: RgbaImage,
}

impl LayeredFrame {
    pub fn new(viewport: Viewport) -> Self {
        let blank = || RgbaImage::from_pixel(viewport.width, viewport.height, Rgba(TRANSPARENT));
        Self {
            background: blank(),
            turn: blank(),
            moves: blank(),
        }
    }

    pub fn composite(&self) -> RgbaImage {
        let mut out = self.background.clone();
        imageops::overlay(&mut out, &self.turn, 0, 0);
        imageops::overlay(&mut out, &self.moves, 0, 0);
        out
    }
}

fn put_clipped(image: &mut RgbaImage, x: i32, y: i32, colour: Colour) {
    if x < 0 || y < 0 || x >= image.width() as i32 || y >= image.height() as i32 {
        return;
    }
    image.put_pixel(x as u32, y as u32, Rgba(colour));
}

pub fn fill_rect(image: &mut RgbaImage, rect: Rect, colour: Colour) {
    let x_start = rect.x.max(0);
    let y_start = rect.y.max(0);
    let x_end = rect.right().min(image.width() as i32);
    let y_end = rect.bottom().min(image.height() as i32);
    for y in y_start..y_end {
        for x in x_start..x_end {
            image.put_pixel(x as u32, y as u32, Rgba(colour));
        }
    }
}

pub fn outline_rect(image: &mut RgbaImage, rect: Rect, thickness: i32, colour: Colour) {
    let t = thickness.max(1).min(rect.width / 2).min(rect.height / 2).max(1);
    fill_rect(image, Rect::new(rect.x, rect.y, rect.width, t), colour);
    fill_rect(image, Rect::new(rect.x, rect.bottom() - t, rect.width, t), colour);
    fill_rect(image, Rect::new(rect.x, rect.y, t, rect.height), colour);
    fill_rect(image, Rect::new(rect.right() - t, rect.y, t, rect.height), colour);
}

pub fn fill_circle(image: &mut RgbaImage, center: PixelPoint, radius: i32, colour: Colour) {
    let r_squared = i64::from(radius) * i64::from(radius);
    for y in (center.y - radius)..=(center.y + radius) {
        for x in (center.x - radius)..=(center.x + radius) {
            if PixelPoint::new(x, y).distance_squared(center) < r_squared {
                put_clipped(image, x, y, colour);
            }
        }
    }
}

/// Thick line stamped as squares along the major axis.
pub fn draw_line(
    image: &mut RgbaImage,
    from: PixelPoint,
    to: PixelPoint,
    thickness: i32,
    colour: Colour,
) {
    let half = (thickness.max(1) - 1) / 2;
    let steps = (to.x - from.x).abs().max((to.y - from.y).abs()).max(1);
    for step in 0..=steps {
        let x = from.x + (to.x - from.x) * step / steps;
        let y = from.y + (to.y - from.y) * step / steps;
        fill_rect(
            image,
            Rect::new(x - half, y - half, 2 * half + 1, 2 * half + 1),
            colour,
        );
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// PNG bytes in the base64 form carried by IMAGE frames.
pub fn encode_png_base64(image: &RgbaImage) -> Result<String, RenderError> {
    Ok(STANDARD.encode(encode_png(image)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Colour = [255, 0, 0, 255];
    const BLUE: Colour = [0, 0, 255, 255];

    #[test]
    fn fill_rect_clips_to_image() {
        let mut image = RgbaImage::from_pixel(10, 10, Rgba(TRANSPARENT));
        fill_rect(&mut image, Rect::new(-5, 8, 8, 8), RED);
        assert_eq!(image.get_pixel(0, 9).0, RED);
        assert_eq!(image.get_pixel(2, 9).0, RED);
        assert_eq!(image.get_pixel(3, 9).0, TRANSPARENT);
        assert_eq!(image.get_pixel(0, 7).0, TRANSPARENT);
    }

    #[test]
    fn upper_layers_cover_background() {
        let mut frame = LayeredFrame::new(Viewport::new(4, 4));
        fill_rect(&mut frame.background, Rect::new(0, 0, 4, 4), RED);
        fill_rect(&mut frame.moves, Rect::new(1, 1, 1, 1), BLUE);
        let out = frame.composite();
        assert_eq!(out.get_pixel(0, 0).0, RED);
        assert_eq!(out.get_pixel(1, 1).0, BLUE);
    }

    #[test]
    fn circle_and_line_mark_expected_pixels() {
        let mut image = RgbaImage::from_pixel(20, 20, Rgba(TRANSPARENT));
        fill_circle(&mut image, PixelPoint::new(10, 10), 3, RED);
        assert_eq!(image.get_pixel(10, 10).0, RED);
        assert_eq!(image.get_pixel(10, 13).0, TRANSPARENT);
        draw_line(&mut image, PixelPoint::new(0, 0), PixelPoint::new(19, 0), 1, BLUE);
        assert_eq!(image.get_pixel(19, 0).0, BLUE);
        assert_eq!(image.get_pixel(19, 1).0, TRANSPARENT);
    }

    #[test]
    fn png_round_trips_through_a_file() {
        let mut image = RgbaImage::from_pixel(3, 2, Rgba(TRANSPARENT));
        fill_rect(&mut image, Rect::new(0, 0, 1, 1), RED);
        let bytes = encode_png(&image).expect("encode");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("frame.png");
        std::fs::write(&path, &bytes).expect("write");
        let loaded = image::open(&path).expect("open").to_rgba8();
        assert_eq!(loaded.dimensions(), (3, 2));
        assert_eq!(loaded.get_pixel(0, 0).0, RED);
    }

    #[test]
    fn base64_payload_decodes_to_png_signature() {
        let image = RgbaImage::from_pixel(1, 1, Rgba(RED));
        let encoded = encode_png_base64(&image).expect("encode");
        let decoded = STANDARD.decode(encoded).expect("decode");
        assert_eq!(&decoded[..4], b"\x89PNG");
    }
}
