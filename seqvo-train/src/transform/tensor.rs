//! Channel-first float images and per-channel normalization

use crate::error::DatasetError;
use image::RgbImage;

/// A CHW float image, values in `[0, 1]` straight after conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl ImageTensor {
    /// Convert an 8-bit RGB image to CHW floats scaled to `[0, 1]`.
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let (width, height) = (width as usize, height as usize);
        let plane = width * height;
        let mut data = vec![0.0f32; 3 * plane];
        for (i, pixel) in image.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = pixel[c] as f32 / 255.0;
            }
        }
        Self {
            channels: 3,
            height,
            width,
            data,
        }
    }

    /// `[channels, height, width]`
    pub fn shape(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// One channel plane, row-major.
    pub fn channel(&self, c: usize) -> &[f32] {
        let plane = self.height * self.width;
        &self.data[c * plane..(c + 1) * plane]
    }

    /// Add `delta` to every value.
    pub fn offset(&mut self, delta: f32) {
        for v in &mut self.data {
            *v += delta;
        }
    }

    /// Mean of each channel.
    pub fn channel_means(&self) -> Vec<f32> {
        (0..self.channels)
            .map(|c| {
                let plane = self.channel(c);
                plane.iter().sum::<f32>() / plane.len().max(1) as f32
            })
            .collect()
    }
}

/// Per-channel `(x - mean) / std`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    mean: [f32; 3],
    std: [f32; 3],
}

impl Normalize {
    pub fn new(mean: [f32; 3], std: [f32; 3]) -> Result<Self, DatasetError> {
        if std.iter().any(|s| *s == 0.0 || !s.is_finite()) || mean.iter().any(|m| !m.is_finite()) {
            return Err(DatasetError::Config(format!(
                "normalization needs finite mean and non-zero std, got mean {mean:?} std {std:?}"
            )));
        }
        Ok(Self { mean, std })
    }

    pub fn mean(&self) -> [f32; 3] {
        self.mean
    }

    pub fn std(&self) -> [f32; 3] {
        self.std
    }

    /// True when the transform leaves values unchanged.
    pub fn is_identity(&self) -> bool {
        self.mean == [0.0; 3] && self.std == [1.0; 3]
    }

    pub fn apply(&self, tensor: &mut ImageTensor) {
        let plane = tensor.height * tensor.width;
        for (c, values) in tensor.data.chunks_mut(plane.max(1)).enumerate().take(3) {
            let (mean, std) = (self.mean[c], self.std[c]);
            for v in values {
                *v = (*v - mean) / std;
            }
        }
    }
}

impl Default for Normalize {
    fn default() -> Self {
        Self {
            mean: [0.0; 3],
            std: [1.0; 3],
        }
    }
}
