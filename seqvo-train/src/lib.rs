//! Seqvo Training Crate
//!
//! Serves fixed-length windows of posed frames to a training loop. Images are
//! decoded and resized once into a shared cache; every access then runs a
//! fresh (possibly random) transform pipeline and computes relative poses.
//!
//! ## Modules
//!
//! - [`cache`]: Deduplicated decode-once image store
//! - [`transform`]: Per-access augmentation, tensor conversion and normalization
//! - [`dataset`]: Index-addressed sample access
//! - [`config`]: Dataset configuration loaded from JSON

pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod transform;

pub use cache::{CachedImage, FileDecoder, ImageCache, ImageDecoder, PopulateReport, Resize};
pub use config::{DatasetConfig, Split};
pub use dataset::{BatchMeta, Dataset, Sample, SampleMeta, SequenceDataset};
pub use error::DatasetError;
pub use transform::{ColorJitter, ImageOp, ImageTensor, Normalize, RuntimeTransform};
