//! Error types for sequence loading and index construction.

use crate::pose::PoseError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading sequences or building the dataset index.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Invalid window parameters: {0}")]
    InvalidWindow(String),

    #[error("Sequence {sequence}: {poses} poses but {images} images")]
    CountMismatch {
        sequence: String,
        poses: usize,
        images: usize,
    },

    #[error("Sequence {sequence}: window at frame {start} has {actual} frames, expected {expected}")]
    WindowLength {
        sequence: String,
        start: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Sequence {sequence}: pose at frame {frame} is unusable: {source}")]
    SingularPose {
        sequence: String,
        frame: usize,
        #[source]
        source: PoseError,
    },

    #[error("Sample index {index} out of range for dataset of {len} samples")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No pose file for sequence {sequence} in {dir}")]
    MissingSequence { sequence: String, dir: PathBuf },

    #[error("{path}:{line}: {reason}")]
    PoseParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    /// True for errors caused by bad window configuration rather than bad data.
    pub fn is_configuration(&self) -> bool {
        matches!(self, DataError::InvalidWindow(_))
    }
}
