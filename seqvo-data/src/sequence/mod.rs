//! Sequences of posed frames and their on-disk loading

mod loader;

pub use loader::{SequenceSource, list_images, load_poses, parse_json_poses, parse_kitti_poses};

use crate::error::DataError;
use glam::DMat4;
use std::path::PathBuf;

/// An ordered run of frames, each with an absolute pose and an image path.
///
/// Pose and image counts always agree; [`Sequence::new`] enforces it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    id: String,
    poses: Vec<DMat4>,
    image_paths: Vec<PathBuf>,
}

impl Sequence {
    /// Create a sequence, rejecting mismatched pose and image counts.
    pub fn new(
        id: impl Into<String>,
        poses: Vec<DMat4>,
        image_paths: Vec<PathBuf>,
    ) -> Result<Self, DataError> {
        let id = id.into();
        if poses.len() != image_paths.len() {
            return Err(DataError::CountMismatch {
                sequence: id,
                poses: poses.len(),
                images: image_paths.len(),
            });
        }
        Ok(Self {
            id,
            poses,
            image_paths,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn poses(&self) -> &[DMat4] {
        &self.poses
    }

    pub fn image_paths(&self) -> &[PathBuf] {
        &self.image_paths
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_count_mismatch() {
        let poses = vec![DMat4::IDENTITY; 3];
        let paths = vec![PathBuf::from("a.png"), PathBuf::from("b.png")];
        match Sequence::new("07", poses, paths) {
            Err(DataError::CountMismatch {
                sequence,
                poses,
                images,
            }) => {
                assert_eq!(sequence, "07");
                assert_eq!(poses, 3);
                assert_eq!(images, 2);
            }
            other => panic!("expected count mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_sequence_accessors() {
        let seq = Sequence::new("00", vec![DMat4::IDENTITY], vec![PathBuf::from("x.png")]).unwrap();
        assert_eq!(seq.id(), "00");
        assert_eq!(seq.len(), 1);
        assert!(!seq.is_empty());
        assert_eq!(seq.image_paths()[0], PathBuf::from("x.png"));
    }
}
