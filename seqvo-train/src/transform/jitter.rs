//! Random brightness, contrast, saturation and hue perturbation.

use super::ImageOp;
use crate::error::DatasetError;
use image::RgbImage;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::Deserialize;

/// Jitter strengths as written in configuration files.
///
/// Brightness, contrast and saturation factors are drawn from
/// `[max(0, 1 - x), 1 + x]`; the hue shift from `[-x, x]` turns, `x <= 0.5`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ColorJitterConfig {
    pub enable: bool,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjustment {
    Brightness,
    Contrast,
    Saturation,
    Hue,
}

/// Randomly perturbs color. Factors are drawn per call and the four
/// adjustments run in a random order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorJitter {
    brightness: Option<(f32, f32)>,
    contrast: Option<(f32, f32)>,
    saturation: Option<(f32, f32)>,
    hue: Option<(f32, f32)>,
}

impl ColorJitter {
    pub fn new(brightness: f32, contrast: f32, saturation: f32, hue: f32) -> Result<Self, DatasetError> {
        let hue = if !(0.0..=0.5).contains(&hue) {
            return Err(DatasetError::Config(format!(
                "hue jitter must be within [0, 0.5], got {hue}"
            )));
        } else if hue == 0.0 {
            None
        } else {
            Some((-hue, hue))
        };

        Ok(Self {
            brightness: factor_range("brightness", brightness)?,
            contrast: factor_range("contrast", contrast)?,
            saturation: factor_range("saturation", saturation)?,
            hue,
        })
    }

    pub fn from_config(config: &ColorJitterConfig) -> Result<Self, DatasetError> {
        Self::new(config.brightness, config.contrast, config.saturation, config.hue)
    }

    /// True when no adjustment is configured.
    pub fn is_noop(&self) -> bool {
        self.brightness.is_none()
            && self.contrast.is_none()
            && self.saturation.is_none()
            && self.hue.is_none()
    }
}

impl ImageOp for ColorJitter {
    fn name(&self) -> &str {
        "color_jitter"
    }

    fn apply(&self, mut image: RgbImage, rng: &mut dyn RngCore) -> RgbImage {
        let brightness = draw(self.brightness, rng);
        let contrast = draw(self.contrast, rng);
        let saturation = draw(self.saturation, rng);
        let hue = draw(self.hue, rng);

        let mut order = [
            Adjustment::Brightness,
            Adjustment::Contrast,
            Adjustment::Saturation,
            Adjustment::Hue,
        ];
        order.shuffle(rng);

        for adjustment in order {
            match adjustment {
                Adjustment::Brightness => {
                    if let Some(factor) = brightness {
                        adjust_brightness(&mut image, factor);
                    }
                }
                Adjustment::Contrast => {
                    if let Some(factor) = contrast {
                        adjust_contrast(&mut image, factor);
                    }
                }
                Adjustment::Saturation => {
                    if let Some(factor) = saturation {
                        adjust_saturation(&mut image, factor);
                    }
                }
                Adjustment::Hue => {
                    if let Some(shift) = hue {
                        adjust_hue(&mut image, shift);
                    }
                }
            }
        }
        image
    }
}

fn factor_range(name: &str, value: f32) -> Result<Option<(f32, f32)>, DatasetError> {
    if !value.is_finite() || value < 0.0 {
        return Err(DatasetError::Config(format!(
            "{name} jitter must be a non-negative number, got {value}"
        )));
    }
    if value == 0.0 {
        return Ok(None);
    }
    Ok(Some(((1.0 - value).max(0.0), 1.0 + value)))
}

fn draw(range: Option<(f32, f32)>, rng: &mut dyn RngCore) -> Option<f32> {
    range.map(|(low, high)| rng.random_range(low..=high))
}

fn luma(rgb: [f32; 3]) -> f32 {
    0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2]
}

fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn map_pixels(image: &mut RgbImage, f: impl Fn([f32; 3]) -> [f32; 3]) {
    for pixel in image.pixels_mut() {
        let rgb = [pixel[0] as f32, pixel[1] as f32, pixel[2] as f32];
        pixel.0 = f(rgb).map(to_u8);
    }
}

fn adjust_brightness(image: &mut RgbImage, factor: f32) {
    map_pixels(image, |rgb| rgb.map(|v| v * factor));
}

fn adjust_contrast(image: &mut RgbImage, factor: f32) {
    let count = (image.width() as usize * image.height() as usize).max(1);
    let total: f32 = image
        .pixels()
        .map(|p| luma([p[0] as f32, p[1] as f32, p[2] as f32]))
        .sum();
    let mean = (total / count as f32).round();
    map_pixels(image, |rgb| rgb.map(|v| mean + factor * (v - mean)));
}

fn adjust_saturation(image: &mut RgbImage, factor: f32) {
    map_pixels(image, |rgb| {
        let gray = luma(rgb);
        rgb.map(|v| gray + factor * (v - gray))
    });
}

fn adjust_hue(image: &mut RgbImage, shift: f32) {
    map_pixels(image, |rgb| {
        let (h, s, v) = rgb_to_hsv(rgb.map(|c| c / 255.0));
        let h = (h + shift).rem_euclid(1.0);
        hsv_to_rgb(h, s, v).map(|c| c * 255.0)
    });
}

/// Hue in turns `[0, 1)`, saturation and value in `[0, 1]`.
fn rgb_to_hsv([r, g, b]: [f32; 3]) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / delta).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    (hue, saturation, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let sector = h * 6.0;
    let i = sector.floor();
    let f = sector - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (i as i32).rem_euclid(6) {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}
