//! Scores rendered images. Large flat areas are penalized, brightness is rewarded a little.

use image::{GenericImageView, Pixel, RgbImage};
use num::cast::ToPrimitive;
use num::Bounded;
use palette::{Hsv, IntoColor, Srgb};

/// Half width of the window (center included) whose identical pixels are penalized.
const SIMILARITY_RADIUS: i64 = 2;
/// Half width of the wider window (center excluded) whose identical pixels are penalized.
const CONTEXT_RADIUS: i64 = 3;
pub const BRIGHTNESS_WEIGHT: f64 = 0.25;

/// Higher is better. Averaged over pixels, so comparable across resolutions. An empty image
/// scores zero.
pub fn evaluate<Img: GenericImageView>(image: &Img) -> f64 {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }
    let max = <<Img::Pixel as Pixel>::Subpixel as Bounded>::max_value()
        .to_f64()
        .unwrap_or(1.0);

    let mut score = 0.0;
    for y in 0..height {
        for x in 0..width {
            let pixel = image.get_pixel(x, y);
            score -= similarity(image, x, y, &pixel, SIMILARITY_RADIUS, true);
            score -= similarity(image, x, y, &pixel, CONTEXT_RADIUS, false);
            score += BRIGHTNESS_WEIGHT * brightness(&pixel, max);
        }
    }
    score / (width as f64 * height as f64)
}

/// Scores raw row-major RGB bytes, `None` if there are not exactly `width * height * 3`.
pub fn evaluate_raw(width: u32, height: u32, bytes: &[u8]) -> Option<f64> {
    if bytes.len() != width as usize * height as usize * 3 {
        return None;
    }
    RgbImage::from_raw(width, height, bytes.to_vec()).map(|image| evaluate(&image))
}

// Fraction of in-bounds window pixels identical to `pixel`.
fn similarity<Img: GenericImageView>(
    image: &Img,
    x: u32,
    y: u32,
    pixel: &Img::Pixel,
    radius: i64,
    include_center: bool,
) -> f64 {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let mut same = 0u32;
    let mut total = 0u32;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx == 0 && dy == 0 && !include_center {
                continue;
            }
            let (nx, ny) = (x as i64 + dx, y as i64 + dy);
            if nx < 0 || ny < 0 || nx >= width || ny >= height {
                continue;
            }
            total += 1;
            if image.get_pixel(nx as u32, ny as u32).channels() == pixel.channels() {
                same += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        same as f64 / total as f64
    }
}

// HSV value in [0, 1].
fn brightness<P: Pixel>(pixel: &P, max: f64) -> f64 {
    let rgb = pixel.to_rgb();
    let channel = |c: usize| (rgb.0[c].to_f64().unwrap_or(0.0) / max) as f32;
    let hsv: Hsv = Srgb::new(channel(0), channel(1), channel(2)).into_color();
    hsv.value as f64
}
