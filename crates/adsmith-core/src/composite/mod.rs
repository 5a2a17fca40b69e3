//! Deterministic compositing of the real product and logo onto a generated
//! background.
//!
//! The product is scaled to a fixed share of the background height, capped by
//! width, and anchored at the bottom centre. The logo is scaled to a fixed
//! share of the background width and tucked into the top-right corner.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::debug;

use crate::config::CompositeConfig;
use crate::error::{Error, Result};

/// Where and how large an overlay lands on the background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Placements for both overlays on one background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub product: Placement,
    pub logo: Placement,
}

impl Layout {
    /// Compute placements from the background size and the overlay sizes
    pub fn compute(
        background: (u32, u32),
        product: (u32, u32),
        logo: (u32, u32),
        config: &CompositeConfig,
    ) -> Self {
        Self {
            product: product_placement(background, product, config),
            logo: logo_placement(background, logo, config),
        }
    }
}

fn aspect((w, h): (u32, u32)) -> f64 {
    w.max(1) as f64 / h.max(1) as f64
}

fn product_placement(
    (bg_w, bg_h): (u32, u32),
    product: (u32, u32),
    config: &CompositeConfig,
) -> Placement {
    let ratio = aspect(product);
    let mut height = (bg_h as f64 * config.product_height_ratio) as u32;
    let mut width = (height as f64 * ratio) as u32;

    let max_width = bg_w as f64 * config.product_max_width_ratio;
    if width as f64 > max_width {
        width = max_width as u32;
        height = (width as f64 / ratio) as u32;
    }

    let width = width.max(1);
    let height = height.max(1);
    let bottom_margin = (bg_h as f64 * config.product_bottom_margin_ratio) as i64;

    Placement {
        x: (bg_w as i64 - width as i64) / 2,
        y: bg_h as i64 - height as i64 - bottom_margin,
        width,
        height,
    }
}

fn logo_placement(
    (bg_w, _bg_h): (u32, u32),
    logo: (u32, u32),
    config: &CompositeConfig,
) -> Placement {
    let width = ((bg_w as f64 * config.logo_width_ratio) as u32).max(1);
    let height = ((width as f64 / aspect(logo)) as u32).max(1);
    let margin = (bg_w as f64 * config.logo_margin_ratio) as i64;

    Placement {
        x: bg_w as i64 - width as i64 - margin,
        y: margin,
        width,
        height,
    }
}

/// Paste product and logo onto the background.
///
/// All inputs are converted to RGBA first; overlays are resized with Lanczos3
/// and alpha-blended, so transparent product cut-outs keep their shape.
pub fn create_composite(
    background: &DynamicImage,
    product: &DynamicImage,
    logo: &DynamicImage,
    config: &CompositeConfig,
) -> RgbaImage {
    let mut canvas = background.to_rgba8();
    if config.background_brightness != 1.0 || config.background_contrast != 1.0 {
        canvas = enhance(
            &canvas,
            config.background_brightness,
            config.background_contrast,
        );
    }

    let product = product.to_rgba8();
    let logo = logo.to_rgba8();
    let layout = Layout::compute(
        canvas.dimensions(),
        product.dimensions(),
        logo.dimensions(),
        config,
    );

    debug!(
        background = ?canvas.dimensions(),
        product = ?layout.product,
        logo = ?layout.logo,
        "Compositing layout"
    );

    paste(&mut canvas, &product, layout.product);
    paste(&mut canvas, &logo, layout.logo);
    canvas
}

fn paste(canvas: &mut RgbaImage, overlay: &RgbaImage, placement: Placement) {
    let resized = imageops::resize(
        overlay,
        placement.width,
        placement.height,
        FilterType::Lanczos3,
    );
    imageops::overlay(canvas, &resized, placement.x, placement.y);
}

/// Scale brightness and contrast, leaving alpha untouched.
///
/// Brightness multiplies each channel (0.0 is black). Contrast interpolates
/// each channel against the mean luminance (0.0 is flat grey). 1.0 leaves the
/// image unchanged.
pub fn enhance(image: &RgbaImage, brightness: f32, contrast: f32) -> RgbaImage {
    let mut out = image.clone();

    if brightness != 1.0 {
        for pixel in out.pixels_mut() {
            for c in 0..3 {
                pixel[c] = clamp_channel(pixel[c] as f32 * brightness);
            }
        }
    }

    if contrast != 1.0 {
        let mean = mean_luminance(&out);
        for pixel in out.pixels_mut() {
            for c in 0..3 {
                pixel[c] = clamp_channel(mean + (pixel[c] as f32 - mean) * contrast);
            }
        }
    }

    out
}

fn mean_luminance(image: &RgbaImage) -> f32 {
    let count = image.pixels().len();
    if count == 0 {
        return 0.0;
    }
    let total: f64 = image
        .pixels()
        .map(|Rgba([r, g, b, _])| 0.299 * *r as f64 + 0.587 * *g as f64 + 0.114 * *b as f64)
        .sum();
    (total / count as f64).round() as f32
}

fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Decode image bytes of any supported format
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| Error::ImageDecodeError(e.to_string()))
}

/// Decode image bytes straight to RGBA
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage> {
    decode_image(bytes).map(|img| img.to_rgba8())
}

/// Encode an RGBA image as PNG
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| Error::ImageEncodeError(e.to_string()))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(rgba)))
    }

    fn close(actual: &Rgba<u8>, expected: [u8; 4]) -> bool {
        actual.0.iter().zip(expected).all(|(a, e)| a.abs_diff(e) <= 2)
    }

    #[test]
    fn test_product_placement_default_ratios() {
        let config = CompositeConfig::default();
        let layout = Layout::compute((1024, 1024), (500, 1000), (200, 100), &config);

        // 40% of 1024 = 409, width = 409 * 0.5 = 204
        assert_eq!(layout.product.height, 409);
        assert_eq!(layout.product.width, 204);
        assert_eq!(layout.product.x, (1024 - 204) / 2);
        // 5% margin = 51
        assert_eq!(layout.product.y, 1024 - 409 - 51);
    }

    #[test]
    fn test_wide_product_is_width_capped() {
        let config = CompositeConfig::default();
        let layout = Layout::compute((1000, 1000), (4000, 1000), (10, 10), &config);

        // natural width 1600 > 900 cap
        assert_eq!(layout.product.width, 900);
        assert_eq!(layout.product.height, 225);
        assert_eq!(layout.product.x, 50);
        assert_eq!(layout.product.y, 1000 - 225 - 50);
    }

    #[test]
    fn test_logo_top_right() {
        let config = CompositeConfig::default();
        let layout = Layout::compute((1000, 800), (10, 10), (300, 100), &config);

        // 15% of 1000 = 150, aspect 3 -> 50 high, margin 20
        assert_eq!(layout.logo.width, 150);
        assert_eq!(layout.logo.height, 50);
        assert_eq!(layout.logo.x, 1000 - 150 - 20);
        assert_eq!(layout.logo.y, 20);
    }

    #[test]
    fn test_degenerate_sizes_stay_positive() {
        let layout = Layout::compute((4, 4), (1, 1000), (1000, 1), &CompositeConfig::default());
        assert!(layout.product.width >= 1 && layout.product.height >= 1);
        assert!(layout.logo.width >= 1 && layout.logo.height >= 1);
    }

    #[test]
    fn test_composite_pastes_opaque_overlays() {
        let background = solid(100, 100, [0, 0, 255, 255]);
        let product = solid(10, 10, [255, 0, 0, 255]);
        let logo = solid(10, 10, [0, 255, 0, 255]);

        let out = create_composite(&background, &product, &logo, &CompositeConfig::default());
        assert_eq!(out.dimensions(), (100, 100));

        // product: 40x40 at (30, 55)
        assert!(close(out.get_pixel(50, 75), [255, 0, 0, 255]));
        // logo: 15x15 at (83, 2)
        assert!(close(out.get_pixel(90, 8), [0, 255, 0, 255]));
        // untouched corner
        assert_eq!(out.get_pixel(2, 2), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_transparent_overlay_leaves_background() {
        let background = solid(100, 100, [10, 20, 30, 255]);
        let clear = solid(10, 10, [255, 255, 255, 0]);

        let out = create_composite(&background, &clear, &clear, &CompositeConfig::default());
        assert!(out.pixels().all(|p| *p == Rgba([10, 20, 30, 255])));
    }

    #[test]
    fn test_rgb_background_becomes_rgba() {
        let rgb = image::RgbImage::from_pixel(64, 64, image::Rgb([1, 2, 3]));
        let background = DynamicImage::ImageRgb8(rgb);
        let product = solid(4, 4, [0, 0, 0, 0]);
        let out = create_composite(&background, &product, &product, &CompositeConfig::default());
        assert_eq!(out.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn test_enhance_identity() {
        let img = RgbaImage::from_fn(8, 8, |x, y| Rgba([(x * 30) as u8, (y * 30) as u8, 77, 200]));
        assert_eq!(enhance(&img, 1.0, 1.0), img);
    }

    #[test]
    fn test_enhance_brightness() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([100, 200, 50, 128]));
        let darker = enhance(&img, 0.5, 1.0);
        assert_eq!(darker.get_pixel(0, 0), &Rgba([50, 100, 25, 128]));

        let brighter = enhance(&img, 2.0, 1.0);
        assert_eq!(brighter.get_pixel(1, 1), &Rgba([200, 255, 100, 128]));
    }

    #[test]
    fn test_enhance_zero_contrast_is_flat() {
        let img = RgbaImage::from_fn(4, 1, |x, _| {
            let v = (x * 60) as u8;
            Rgba([v, v, v, 255])
        });
        let flat = enhance(&img, 1.0, 0.0);
        let first = *flat.get_pixel(0, 0);
        assert!(flat.pixels().all(|p| *p == first));
        assert_eq!(first[3], 255);
    }

    #[test]
    fn test_png_roundtrip_and_bad_bytes() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([9, 8, 7, 6]));
        let bytes = encode_png(&img).unwrap();
        let decoded = decode_rgba(&bytes).unwrap();
        assert_eq!(decoded, img);

        assert!(matches!(decode_image(b"nope"), Err(Error::ImageDecodeError(_))));
    }
}
