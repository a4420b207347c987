//! Fixed-length windowing of pose/image sequences into training subsequences.

use crate::error::DataError;
use crate::pose::{self, PoseError, RelativePose};
use crate::sequence::Sequence;
use glam::DMat4;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

fn default_repeats() -> usize {
    1
}

/// How a sequence is cut into windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowParams {
    /// Frames per window.
    pub length: usize,
    /// Trailing frames of one window that reappear at the head of the next.
    pub overlap: usize,
    /// Number of start offsets tiling the same sequence.
    #[serde(default = "default_repeats")]
    pub repeats: usize,
}

impl WindowParams {
    /// Create validated window parameters.
    pub fn new(length: usize, overlap: usize, repeats: usize) -> Result<Self, DataError> {
        let params = Self {
            length,
            overlap,
            repeats,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check `length >= 2`, `overlap < length` and `repeats >= 1`.
    pub fn validate(&self) -> Result<(), DataError> {
        if self.length < 2 {
            return Err(DataError::InvalidWindow(format!(
                "length must be at least 2 to form a frame pair, got {}",
                self.length
            )));
        }
        if self.overlap >= self.length {
            return Err(DataError::InvalidWindow(format!(
                "overlap {} must be smaller than length {}, otherwise windows never advance",
                self.overlap, self.length
            )));
        }
        if self.repeats == 0 {
            return Err(DataError::InvalidWindow("repeats must be at least 1".into()));
        }
        Ok(())
    }

    /// Distance between the starts of consecutive windows on one offset.
    pub fn jump(&self) -> usize {
        self.length.saturating_sub(self.overlap)
    }

    /// Start offsets of the independent tilings.
    ///
    /// With more than one repeat the offsets are multiples of
    /// `ceil(length / repeats)` below `length`, which can yield fewer than
    /// `repeats` offsets when the interval does not divide evenly.
    pub fn start_offsets(&self) -> Vec<usize> {
        if self.repeats <= 1 {
            return vec![0];
        }
        let interval = self.length.div_ceil(self.repeats);
        (0..self.length).step_by(interval).collect()
    }

    /// Windows a single offset-0 tiling produces over `frames` frames.
    pub fn windows_per_tiling(&self, frames: usize) -> usize {
        if frames < self.length || self.jump() == 0 {
            return 0;
        }
        (frames - self.length) / self.jump() + 1
    }
}

/// Origin of a window. Mirrored and reversed windows are not produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    #[default]
    Normal,
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowKind::Normal => f.write_str("normal"),
        }
    }
}

/// One fixed-length training window cut from a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsequenceDescriptor {
    /// Identifier of the source sequence.
    pub sequence: String,
    /// Index of the first frame within the sequence.
    pub start: usize,
    /// Where the following window on the same offset starts.
    pub next_start: usize,
    /// Image paths in temporal order.
    pub image_paths: Vec<PathBuf>,
    /// Absolute poses in temporal order.
    pub poses: Vec<DMat4>,
    pub kind: WindowKind,
}

impl SubsequenceDescriptor {
    /// Number of frames in the window.
    pub fn len(&self) -> usize {
        self.image_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_paths.is_empty()
    }

    /// `[start, next_start]`
    pub fn id(&self) -> [usize; 2] {
        [self.start, self.next_start]
    }

    /// Motion between each consecutive frame pair, oldest pair first.
    ///
    /// A singular first pose is blamed on frame `k`; a product that is no
    /// longer a rotation is blamed on frame `k + 1`.
    pub fn relative_poses(&self) -> Result<Vec<RelativePose>, DataError> {
        self.poses
            .windows(2)
            .enumerate()
            .map(|(k, pair)| {
                pose::relative_pose(&pair[0], &pair[1]).map_err(|source| {
                    let frame = match source {
                        PoseError::Singular { .. } => self.start + k,
                        PoseError::Degenerate { .. } => self.start + k + 1,
                    };
                    DataError::SingularPose {
                        sequence: self.sequence.clone(),
                        frame,
                        source,
                    }
                })
            })
            .collect()
    }
}

/// Cut one sequence into windows.
///
/// Output is ordered by start offset, then by window position. Frames at the
/// tail that cannot fill a whole window are dropped.
pub fn build_subsequences(
    sequence: &Sequence,
    params: &WindowParams,
) -> Result<Vec<SubsequenceDescriptor>, DataError> {
    params.validate()?;

    let frames = sequence.len();
    let jump = params.jump();
    let offsets = params.start_offsets();
    debug!(
        "Sequence {}: {} frames, offsets {:?}, jump {}",
        sequence.id(),
        frames,
        offsets,
        jump
    );

    let mut windows = Vec::new();
    for &offset in &offsets {
        for start in (offset..frames).step_by(jump) {
            let end = start + params.length;
            if end > frames {
                break;
            }
            windows.push(SubsequenceDescriptor {
                sequence: sequence.id().to_string(),
                start,
                next_start: start + jump,
                image_paths: sequence.image_paths()[start..end].to_vec(),
                poses: sequence.poses()[start..end].to_vec(),
                kind: WindowKind::Normal,
            });
        }
    }

    for window in &windows {
        check_window_length(window, params.length)?;
    }
    Ok(windows)
}

pub(crate) fn check_window_length(
    window: &SubsequenceDescriptor,
    expected: usize,
) -> Result<(), DataError> {
    if window.image_paths.len() != expected || window.poses.len() != expected {
        return Err(DataError::WindowLength {
            sequence: window.sequence.clone(),
            start: window.start,
            expected,
            actual: window.image_paths.len().min(window.poses.len()),
        });
    }
    Ok(())
}
