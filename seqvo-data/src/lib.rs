//! Seqvo Data Crate
//!
//! Pose algebra, sequence loading and windowing for visual-odometry training data.
//! This crate is image agnostic: it deals in poses, frame indices and file paths.
//! Decoding and augmenting the frames themselves lives in seqvo-train.

pub mod error;
pub mod index;
pub mod pose;
pub mod sequence;
pub mod window;

pub use error::DataError;
pub use index::DatasetIndex;
pub use pose::{PoseError, RelativePose};
pub use sequence::{Sequence, SequenceSource};
pub use window::{SubsequenceDescriptor, WindowKind, WindowParams, build_subsequences};
