//! Seqvo
//!
//! Prepares sequential camera-pose training data for learned visual odometry:
//! sequences are cut into fixed-length windows, absolute poses become
//! inter-frame translations and rotation vectors, and frames are decoded once
//! into a cache shared by every window.
//!
//! - [`data`]: pose algebra, windowing and the dataset index (`seqvo-data`)
//! - [`train`]: image cache, transforms and sample access (`seqvo-train`)

pub use seqvo_data as data;
pub use seqvo_train as train;

pub use seqvo_data::{DatasetIndex, RelativePose, Sequence, WindowParams};
pub use seqvo_train::{Dataset, DatasetConfig, Sample, SequenceDataset};
