//! Per-access image transforms
//!
//! The cached base image is run through a fresh pipeline on every access:
//! - Image operators (random augmentation when training)
//! - Conversion to a CHW float tensor in `[0, 1]`
//! - Optional recentering to `[-0.5, 0.5]`
//! - Per-channel normalization

mod jitter;
mod tensor;

pub use jitter::{ColorJitter, ColorJitterConfig};
pub use tensor::{ImageTensor, Normalize};

use image::RgbImage;
use rand::RngCore;
use std::fmt;

/// An image-to-image operator applied on every access.
///
/// Operators may draw from `rng`; they must not keep state between calls,
/// since one pipeline is shared by concurrent readers.
pub trait ImageOp: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, image: RgbImage, rng: &mut dyn RngCore) -> RgbImage;
}

/// Ordered operator list followed by tensor conversion and normalization.
#[derive(Debug, Default)]
pub struct RuntimeTransform {
    ops: Vec<Box<dyn ImageOp>>,
    minus_point_5: bool,
    normalize: Normalize,
}

impl RuntimeTransform {
    /// Conversion only: no operators, no recentering, identity normalization.
    pub fn evaluation() -> Self {
        Self::default()
    }

    /// Append an operator.
    pub fn with_op(mut self, op: impl ImageOp + 'static) -> Self {
        self.ops.push(Box::new(op));
        self
    }

    /// Shift values from `[0, 1]` to `[-0.5, 0.5]` before normalizing.
    pub fn with_minus_point_5(mut self, enabled: bool) -> Self {
        self.minus_point_5 = enabled;
        self
    }

    pub fn with_normalize(mut self, normalize: Normalize) -> Self {
        self.normalize = normalize;
        self
    }

    /// True when at least one operator runs before conversion.
    pub fn has_ops(&self) -> bool {
        !self.ops.is_empty()
    }

    pub fn minus_point_5(&self) -> bool {
        self.minus_point_5
    }

    pub fn normalize(&self) -> &Normalize {
        &self.normalize
    }

    /// Transform a cached base image into a tensor.
    pub fn apply(&self, base: &RgbImage, rng: &mut dyn RngCore) -> ImageTensor {
        let mut tensor = if self.ops.is_empty() {
            ImageTensor::from_rgb(base)
        } else {
            let mut image = base.clone();
            for op in &self.ops {
                image = op.apply(image, &mut *rng);
            }
            ImageTensor::from_rgb(&image)
        };

        if self.minus_point_5 {
            tensor.offset(-0.5);
        }
        self.normalize.apply(&mut tensor);
        tensor
    }

    /// One-line summary for logs.
    pub fn describe(&self) -> String {
        let ops: Vec<&str> = self.ops.iter().map(|op| op.name()).collect();
        format!(
            "ops=[{}] minus_point_5={} normalize(mean={:?}, std={:?})",
            ops.join(", "),
            self.minus_point_5,
            self.normalize.mean(),
            self.normalize.std()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[derive(Debug)]
    struct Invert;

    impl ImageOp for Invert {
        fn name(&self) -> &str {
            "invert"
        }

        fn apply(&self, mut image: RgbImage, _rng: &mut dyn RngCore) -> RgbImage {
            for p in image.pixels_mut() {
                p.0 = p.0.map(|v| 255 - v);
            }
            image
        }
    }

    #[test]
    fn test_evaluation_is_conversion_only() {
        let base = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        let tensor = RuntimeTransform::evaluation().apply(&base, &mut StdRng::seed_from_u64(0));
        assert_eq!(tensor, ImageTensor::from_rgb(&base));
    }

    #[test]
    fn test_pipeline_order() {
        let base = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        let transform = RuntimeTransform::evaluation()
            .with_op(Invert)
            .with_minus_point_5(true)
            .with_normalize(Normalize::new([0.0; 3], [0.5; 3]).unwrap());
        let tensor = transform.apply(&base, &mut StdRng::seed_from_u64(0));

        // Inverted to (0, 255, 255), then [0, 1], then -0.5, then / 0.5.
        assert_eq!(tensor.data().to_vec(), vec![-1.0, 1.0, 1.0]);
        assert!(transform.has_ops());
        assert!(transform.describe().contains("invert"));
    }

    #[test]
    fn test_base_image_untouched() {
        let base = RgbImage::from_pixel(1, 1, Rgb([10, 20, 30]));
        let transform = RuntimeTransform::evaluation().with_op(Invert);
        transform.apply(&base, &mut StdRng::seed_from_u64(0));
        assert_eq!(base.get_pixel(0, 0).0, [10, 20, 30]);
    }
}
