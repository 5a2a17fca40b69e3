//! Init canvas for image-to-image generation

use std::io::Cursor;

use image::{DynamicImage, Rgb, RgbImage};

use crate::error::{Error, Result};

const TOP: [f32; 3] = [240.0, 240.0, 245.0];
const FALLOFF: [f32; 3] = [20.0, 20.0, 15.0];

/// A soft vertical gradient from (240, 240, 245) at the top to
/// roughly (220, 220, 230) at the bottom.
pub fn base_canvas(width: u32, height: u32) -> RgbImage {
    let h = height.max(1) as f32;
    RgbImage::from_fn(width, height, |_, y| {
        let t = y as f32 / h;
        Rgb([
            (TOP[0] - t * FALLOFF[0]) as u8,
            (TOP[1] - t * FALLOFF[1]) as u8,
            (TOP[2] - t * FALLOFF[2]) as u8,
        ])
    })
}

/// The base canvas encoded as PNG, ready for upload
pub fn base_canvas_png(width: u32, height: u32) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(base_canvas(width, height))
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| Error::ImageEncodeError(e.to_string()))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_endpoints() {
        let canvas = base_canvas(8, 100);
        assert_eq!(canvas.dimensions(), (8, 100));
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([240, 240, 245]));
        assert_eq!(canvas.get_pixel(7, 50), &Rgb([230, 230, 237]));

        let bottom = canvas.get_pixel(3, 99);
        assert!(bottom[0] > 219 && bottom[0] < 222);
        assert!(bottom[2] > 229 && bottom[2] < 232);
    }

    #[test]
    fn test_rows_are_uniform() {
        let canvas = base_canvas(16, 16);
        for y in 0..16 {
            let first = canvas.get_pixel(0, y);
            assert!((0..16).all(|x| canvas.get_pixel(x, y) == first));
        }
    }

    #[test]
    fn test_png_encoding() {
        let bytes = base_canvas_png(64, 64).unwrap();
        assert!(bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]));
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }
}
