//! Error types for dataset construction and sample access.

use seqvo_data::DataError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building or reading a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Image {0} was never cached; the cache must be populated before access")]
    MissingCacheEntry(PathBuf),

    #[error("Failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
