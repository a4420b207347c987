//! Configuration loading, logging setup and the dataset inspection run.

use seqvo_data::{DataError, DatasetIndex, Sequence, SubsequenceDescriptor, WindowParams};
use seqvo_train::{
    Dataset, DatasetConfig, DatasetError, FileDecoder, Sample, SequenceDataset, Split,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors surfaced by the command-line tool.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub enable_tracy: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracy: false,
        }
    }
}

/// Top-level configuration file: dataset settings plus logging.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppError {
    /// True when the run failed because of the configuration rather than the data.
    pub fn is_configuration(&self) -> bool {
        match self {
            AppError::ConfigRead { .. } | AppError::ConfigParse { .. } => true,
            AppError::Dataset(DatasetError::Config(_)) => true,
            AppError::Dataset(DatasetError::Data(e)) | AppError::Data(e) => e.is_configuration(),
            AppError::Dataset(_) => false,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| AppError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.dataset.validate()?;
        Ok(config)
    }
}

/// What a run should do once the configuration is loaded.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub split: Split,
    pub training: bool,
    pub sample: Option<usize>,
    pub index_only: bool,
}

pub fn init_logging(logging: &LoggingConfig) {
    #[cfg(feature = "tracy")]
    {
        if logging.enable_tracy {
            use tracing_subscriber::Layer;
            use tracing_subscriber::layer::SubscriberExt;
            use tracing_subscriber::util::SubscriberInitExt;
            tracing_subscriber::registry()
                .with(tracing_tracy::TracyLayer::default())
                .with(
                    tracing_subscriber::fmt::layer().with_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env()
                            .unwrap_or_else(|_| logging.level.clone().into()),
                    ),
                )
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level)),
        )
        .with_target(false)
        .init();
}

/// Build the index (and unless `index_only`, the image cache) and report on it.
pub fn run(config: &AppConfig, options: RunOptions) -> Result<(), AppError> {
    let dataset_config = &config.dataset;
    let ids = dataset_config.sequences(options.split);
    if ids.is_empty() {
        warn!("No sequences configured for {:?}", options.split);
        return Ok(());
    }

    let sequences = dataset_config.sequence_source().load_all(ids)?;
    let index = DatasetIndex::build(&sequences, dataset_config.window)?;
    report_index(&index, &sequences);

    if options.index_only {
        if let Some(i) = options.sample {
            print_window(index.get(i)?)?;
        }
        return Ok(());
    }

    let transform = dataset_config.runtime_transform(options.training)?;
    let mut next_report = 0.0;
    let dataset = SequenceDataset::with_progress(
        index,
        &FileDecoder,
        dataset_config.resize(),
        transform,
        |done, total| {
            let fraction = done as f64 / total.max(1) as f64;
            if fraction >= next_report {
                info!("Processed {}/{} ({:.2}%)", done, total, fraction * 100.0);
                next_report = fraction + 0.1;
            }
        },
    )?;
    info!("Dataset has {} samples", dataset.len());

    if let Some(i) = options.sample {
        print_sample(&dataset.get(i)?);
    }
    Ok(())
}

/// Windows `params` should cut from a sequence of `frames` frames over all start offsets.
fn expected_windows(params: &WindowParams, frames: usize) -> usize {
    params
        .start_offsets()
        .iter()
        .map(|&offset| params.windows_per_tiling(frames.saturating_sub(offset)))
        .sum()
}

fn report_index(index: &DatasetIndex, sequences: &[Sequence]) {
    let counts = index.windows_per_sequence();
    for sequence in sequences {
        let actual = counts
            .iter()
            .find(|(id, _)| *id == sequence.id())
            .map_or(0, |(_, count)| *count);
        let expected = expected_windows(index.params(), sequence.len());
        info!(
            "  {}: {} frames, {} windows",
            sequence.id(),
            sequence.len(),
            actual
        );
        if actual != expected {
            warn!(
                "  {}: expected {} windows from {} frames, index holds {}",
                sequence.id(),
                expected,
                sequence.len(),
                actual
            );
        }
    }
    let unique = index.unique_image_paths().len();
    let references: usize = index.iter().map(|w| w.len()).sum();
    info!(
        "{} windows, {} distinct frames, {} frame references ({:.2}x reuse)",
        index.len(),
        unique,
        references,
        references as f64 / unique.max(1) as f64
    );
}

fn print_window(window: &SubsequenceDescriptor) -> Result<(), DataError> {
    println!(
        "sequence={} kind={} id=[{}, {}] length={}",
        window.sequence,
        window.kind,
        window.start,
        window.next_start,
        window.len()
    );
    for path in &window.image_paths {
        println!("  {}", path.display());
    }
    for (k, pose) in window.relative_poses()?.iter().enumerate() {
        println!("  {} -> {}: {:?}", k, k + 1, pose.to_array());
    }
    Ok(())
}

fn print_sample(sample: &Sample) {
    let meta = &sample.meta;
    println!(
        "sequence={} kind={} id=[{}, {}] length={}",
        meta.sequence, meta.kind, meta.id[0], meta.id[1], meta.length
    );
    for (k, image) in sample.images.iter().enumerate() {
        println!("  image {}: shape {:?} channel means {:?}", k, image.shape(), image.channel_means());
    }
    for (k, row) in sample.pose_rows().iter().enumerate() {
        println!("  {} -> {}: {:?}", k, k + 1, row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_flattens_dataset() {
        let text = r#"{
            "pose_dir": "poses",
            "image_dir": "images",
            "train_sequences": ["00"],
            "window": { "length": 4, "overlap": 1, "repeats": 2 },
            "logging": { "level": "debug" }
        }"#;
        let config: AppConfig = serde_json::from_str(text).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.enable_tracy);
        assert_eq!(config.dataset.window.repeats, 2);
        assert_eq!(config.dataset.sequences(Split::Train), ["00"]);
    }

    #[test]
    fn test_logging_defaults() {
        let text = r#"{ "pose_dir": "p", "image_dir": "i", "window": { "length": 2, "overlap": 0 } }"#;
        let config: AppConfig = serde_json::from_str(text).unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_expected_windows_matches_index() {
        use glam::DMat4;
        use std::path::PathBuf;

        let sequences: Vec<Sequence> = [("00", 11), ("01", 10), ("02", 3)]
            .into_iter()
            .map(|(id, frames)| {
                let poses = vec![DMat4::IDENTITY; frames];
                let paths = (0..frames)
                    .map(|i| PathBuf::from(format!("{id}/{i:06}.png")))
                    .collect();
                Sequence::new(id, poses, paths).unwrap()
            })
            .collect();

        for params in [
            WindowParams::new(5, 2, 1).unwrap(),
            WindowParams::new(5, 0, 2).unwrap(),
            WindowParams::new(4, 1, 3).unwrap(),
        ] {
            let index = DatasetIndex::build(&sequences, params).unwrap();
            let counts = index.windows_per_sequence();
            for sequence in &sequences {
                let actual = counts
                    .iter()
                    .find(|(id, _)| *id == sequence.id())
                    .map_or(0, |(_, count)| *count);
                assert_eq!(expected_windows(&params, sequence.len()), actual);
            }
        }
        assert_eq!(expected_windows(&WindowParams::new(5, 2, 1).unwrap(), 11), 3);
        assert_eq!(expected_windows(&WindowParams::new(5, 0, 2).unwrap(), 10), 3);
    }

    #[test]
    fn test_configuration_errors_are_classified() {
        let invalid = WindowParams::new(1, 0, 1).unwrap_err();
        assert!(AppError::Data(invalid).is_configuration());
        assert!(AppError::Dataset(DatasetError::Config("bad".into())).is_configuration());

        let mismatch = DataError::CountMismatch {
            sequence: "03".into(),
            poses: 6,
            images: 5,
        };
        assert!(!AppError::Dataset(DatasetError::Data(mismatch)).is_configuration());
        assert!(
            AppConfig::load(Path::new("/nonexistent/seqvo.json"))
                .unwrap_err()
                .is_configuration()
        );
    }

    #[test]
    fn test_missing_config_file() {
        assert!(matches!(
            AppConfig::load(Path::new("/nonexistent/seqvo.json")),
            Err(AppError::ConfigRead { .. })
        ));
    }
}
