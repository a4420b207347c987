//! Dataset configuration, loaded from JSON and passed explicitly to builders.

use crate::cache::Resize;
use crate::error::DatasetError;
use crate::transform::{ColorJitter, ColorJitterConfig, Normalize, RuntimeTransform};
use seqvo_data::{SequenceSource, WindowParams};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

fn default_image_extension() -> String {
    "png".to_string()
}

/// Which sequence list to build a dataset from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Split {
    #[default]
    Train,
    Valid,
}

/// Target size of the one-time resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Per-channel normalization as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            mean: [0.0; 3],
            std: [1.0; 3],
        }
    }
}

/// Everything needed to build a [`crate::SequenceDataset`] from disk.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetConfig {
    /// Directory holding `<sequence>.txt` or `<sequence>.json` pose files.
    pub pose_dir: PathBuf,
    /// Directory holding one image subdirectory per sequence.
    pub image_dir: PathBuf,
    #[serde(default = "default_image_extension")]
    pub image_extension: String,
    #[serde(default)]
    pub train_sequences: Vec<String>,
    #[serde(default)]
    pub valid_sequences: Vec<String>,
    pub window: WindowParams,
    /// Resize applied once when caching; `None` keeps decoded sizes.
    #[serde(default)]
    pub image: Option<ImageSize>,
    #[serde(default)]
    pub color_jitter: ColorJitterConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub minus_point_5: bool,
}

impl DatasetConfig {
    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        debug!("Loading dataset config from {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self, DatasetError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check window parameters, image size and transform settings.
    pub fn validate(&self) -> Result<(), DatasetError> {
        self.window.validate()?;
        if let Some(size) = self.image {
            if size.width == 0 || size.height == 0 {
                return Err(DatasetError::Config(format!(
                    "image size must be positive, got {}x{}",
                    size.width, size.height
                )));
            }
        }
        self.runtime_transform(true)?;
        Ok(())
    }

    pub fn sequences(&self, split: Split) -> &[String] {
        match split {
            Split::Train => &self.train_sequences,
            Split::Valid => &self.valid_sequences,
        }
    }

    pub fn sequence_source(&self) -> SequenceSource {
        SequenceSource::new(&self.pose_dir, &self.image_dir)
            .with_image_extension(self.image_extension.clone())
    }

    pub fn resize(&self) -> Option<Resize> {
        self.image.map(|size| Resize::new(size.width, size.height))
    }

    /// Per-access pipeline: jitter only when training and enabled.
    pub fn runtime_transform(&self, training: bool) -> Result<RuntimeTransform, DatasetError> {
        let normalize = Normalize::new(self.normalize.mean, self.normalize.std)?;
        let mut transform = RuntimeTransform::evaluation()
            .with_minus_point_5(self.minus_point_5)
            .with_normalize(normalize);
        if training && self.color_jitter.enable {
            let jitter = ColorJitter::from_config(&self.color_jitter)?;
            if !jitter.is_noop() {
                transform = transform.with_op(jitter);
            }
        }
        Ok(transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "pose_dir": "data/poses",
        "image_dir": "data/images",
        "train_sequences": ["00", "02"],
        "valid_sequences": ["05"],
        "window": { "length": 6, "overlap": 1 }
    }"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = DatasetConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.image_extension, "png");
        assert_eq!(config.window.repeats, 1);
        assert_eq!(config.sequences(Split::Train), ["00", "02"]);
        assert_eq!(config.sequences(Split::Valid), ["05"]);
        assert!(config.resize().is_none());
        assert!(!config.minus_point_5);
        assert!(config.normalize.std == [1.0; 3]);
    }

    #[test]
    fn test_full_config() {
        let text = r#"{
            "pose_dir": "p",
            "image_dir": "i",
            "image_extension": "jpg",
            "window": { "length": 5, "overlap": 2, "repeats": 2 },
            "image": { "width": 608, "height": 184 },
            "color_jitter": { "enable": true, "brightness": 0.1, "contrast": 0.1, "saturation": 0.1, "hue": 0.05 },
            "normalize": { "mean": [0.2, 0.3, 0.4], "std": [0.5, 0.5, 0.5] },
            "minus_point_5": true
        }"#;
        let config = DatasetConfig::from_json(text).unwrap();
        assert_eq!(config.resize().unwrap().width, 608);
        assert_eq!(config.sequence_source().image_extension, "jpg");

        let training = config.runtime_transform(true).unwrap();
        assert!(training.has_ops());
        assert!(training.minus_point_5());
        let evaluation = config.runtime_transform(false).unwrap();
        assert!(!evaluation.has_ops());
    }

    #[test]
    fn test_invalid_window_rejected() {
        let text = MINIMAL.replace("\"overlap\": 1", "\"overlap\": 6");
        assert!(matches!(
            DatasetConfig::from_json(&text),
            Err(DatasetError::Data(_))
        ));
    }

    #[test]
    fn test_zero_std_rejected() {
        let text = MINIMAL.replace(
            "\"window\"",
            "\"normalize\": { \"std\": [1.0, 0.0, 1.0] }, \"window\"",
        );
        assert!(matches!(
            DatasetConfig::from_json(&text),
            Err(DatasetError::Config(_))
        ));
    }
}
