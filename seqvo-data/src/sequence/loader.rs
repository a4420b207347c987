//! Pose file parsing and image directory listing

use crate::error::DataError;
use crate::sequence::Sequence;
use glam::DMat4;
use npyz::{NpyFile, Order};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pose file extensions tried in order when resolving a sequence.
const POSE_EXTENSIONS: [&str; 3] = ["txt", "json", "npy"];

/// Resolves sequence identifiers to `pose_dir/<id>.{txt,json,npy}` and
/// `image_dir/<id>/*.<image_extension>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSource {
    pub pose_dir: PathBuf,
    pub image_dir: PathBuf,
    pub image_extension: String,
}

impl SequenceSource {
    pub fn new(pose_dir: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            pose_dir: pose_dir.into(),
            image_dir: image_dir.into(),
            image_extension: "png".to_string(),
        }
    }

    /// Set the image file extension (without the dot).
    pub fn with_image_extension(mut self, extension: impl Into<String>) -> Self {
        self.image_extension = extension.into();
        self
    }

    /// Location of the pose file for a sequence.
    pub fn pose_path(&self, id: &str) -> Result<PathBuf, DataError> {
        POSE_EXTENSIONS
            .iter()
            .map(|ext| self.pose_dir.join(format!("{id}.{ext}")))
            .find(|path| path.is_file())
            .ok_or_else(|| DataError::MissingSequence {
                sequence: id.to_string(),
                dir: self.pose_dir.clone(),
            })
    }

    /// Load poses and sorted image paths for one sequence.
    #[tracing::instrument(skip(self))]
    pub fn load(&self, id: &str) -> Result<Sequence, DataError> {
        let poses = load_poses(&self.pose_path(id)?)?;
        let images = list_images(&self.image_dir.join(id), &self.image_extension)?;
        info!("Sequence {}: {} poses, {} images", id, poses.len(), images.len());
        Sequence::new(id, poses, images)
    }

    /// Load several sequences in order, stopping at the first failure.
    pub fn load_all<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Sequence>, DataError> {
        ids.iter().map(|id| self.load(id.as_ref())).collect()
    }
}

/// Load absolute poses from a KITTI text file, a JSON file or a NumPy array.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_poses(path: &Path) -> Result<Vec<DMat4>, DataError> {
    let poses = match path.extension().and_then(|e| e.to_str()) {
        Some("npy") => parse_npy_poses(&fs::read(path)?, path)?,
        Some("json") => parse_json_poses(&fs::read_to_string(path)?, path)?,
        Some("txt") => parse_kitti_poses(&fs::read_to_string(path)?, path)?,
        other => {
            warn!("Unknown pose file extension {:?}, trying KITTI text", other);
            parse_kitti_poses(&fs::read_to_string(path)?, path)?
        }
    };
    debug!("Loaded {} poses", poses.len());
    Ok(poses)
}

/// Parse KITTI-style poses: one row-major 3x4 (12 values) or 4x4 (16 values)
/// matrix per non-empty line.
pub fn parse_kitti_poses(text: &str, path: &Path) -> Result<Vec<DMat4>, DataError> {
    let mut poses = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let values = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DataError::PoseParse {
                path: path.to_path_buf(),
                line: line_no + 1,
                reason: e.to_string(),
            })?;

        let mut rows = [[0.0; 4]; 4];
        rows[3][3] = 1.0;
        match values.len() {
            12 | 16 => {
                for (i, value) in values.iter().enumerate() {
                    rows[i / 4][i % 4] = *value;
                }
            }
            n => {
                return Err(DataError::PoseParse {
                    path: path.to_path_buf(),
                    line: line_no + 1,
                    reason: format!("expected 12 or 16 values, found {n}"),
                });
            }
        }
        poses.push(from_rows(&rows));
    }
    Ok(poses)
}

/// Parse a JSON array of row-major 4x4 matrices.
pub fn parse_json_poses(text: &str, path: &Path) -> Result<Vec<DMat4>, DataError> {
    let matrices: Vec<[[f64; 4]; 4]> =
        serde_json::from_str(text).map_err(|source| DataError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(matrices.iter().map(from_rows).collect())
}

/// Parse a C-ordered `.npy` array of shape `(N, 4, 4)` holding f64 or f32
/// matrices. Errors carry line 0, as the file has no lines.
pub fn parse_npy_poses(bytes: &[u8], path: &Path) -> Result<Vec<DMat4>, DataError> {
    let malformed = |reason: String| DataError::PoseParse {
        path: path.to_path_buf(),
        line: 0,
        reason,
    };

    let npy = NpyFile::new(bytes).map_err(|e| malformed(e.to_string()))?;
    let shape = npy.shape().to_vec();
    if shape.len() != 3 || shape[1] != 4 || shape[2] != 4 {
        return Err(malformed(format!("expected shape (N, 4, 4), found {shape:?}")));
    }
    if matches!(npy.order(), Order::Fortran) {
        return Err(malformed("Fortran-ordered arrays are not supported".into()));
    }

    let values: Vec<f64> = match npy.into_vec::<f64>() {
        Ok(values) => values,
        Err(_) => NpyFile::new(bytes)
            .and_then(|npy| npy.into_vec::<f32>())
            .map_err(|e| malformed(format!("expected f64 or f32 data: {e}")))?
            .into_iter()
            .map(f64::from)
            .collect(),
    };
    Ok(values
        .chunks_exact(16)
        .map(|m| DMat4::from_cols_slice(m).transpose())
        .collect())
}

/// Files in `dir` with the given extension, sorted by file name.
pub fn list_images(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, DataError> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    debug!("Found {} .{} images in {}", paths.len(), extension, dir.display());
    Ok(paths)
}

fn from_rows(rows: &[[f64; 4]; 4]) -> DMat4 {
    DMat4::from_cols_array_2d(rows).transpose()
}
