//! Flat, position-addressed table of training windows across sequences.

use crate::error::DataError;
use crate::sequence::Sequence;
use crate::window::{self, SubsequenceDescriptor, WindowParams, build_subsequences};
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Every window of every sequence, in sequence, offset and window order.
///
/// A window's position in the table is its sample index for the lifetime of
/// the index. The table is read-only once built.
#[derive(Debug, Clone)]
pub struct DatasetIndex {
    params: WindowParams,
    windows: Vec<SubsequenceDescriptor>,
}

impl DatasetIndex {
    /// Window every sequence and concatenate the results.
    ///
    /// Fails on the first invalid parameter set or malformed sequence; no
    /// sequence is skipped.
    pub fn build(sequences: &[Sequence], params: WindowParams) -> Result<Self, DataError> {
        params.validate()?;

        let mut windows = Vec::new();
        for sequence in sequences {
            let started = Instant::now();
            let produced = build_subsequences(sequence, &params)?;
            info!(
                "Sequence {}: {} windows from {} frames in {:.3}s",
                sequence.id(),
                produced.len(),
                sequence.len(),
                started.elapsed().as_secs_f64()
            );
            windows.extend(produced);
        }

        for descriptor in &windows {
            window::check_window_length(descriptor, params.length)?;
        }

        info!(
            "Dataset index: {} windows of length {} from {} sequences",
            windows.len(),
            params.length,
            sequences.len()
        );
        Ok(Self { params, windows })
    }

    /// Number of windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Window at a sample index.
    pub fn get(&self, index: usize) -> Result<&SubsequenceDescriptor, DataError> {
        self.windows.get(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: self.windows.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubsequenceDescriptor> {
        self.windows.iter()
    }

    pub fn params(&self) -> &WindowParams {
        &self.params
    }

    /// Frames per window, shared by every entry.
    pub fn window_length(&self) -> usize {
        self.params.length
    }

    /// Distinct image paths referenced by any window, in first-seen order.
    pub fn unique_image_paths(&self) -> Vec<&Path> {
        let mut seen = HashSet::new();
        self.windows
            .iter()
            .flat_map(|w| w.image_paths.iter())
            .map(|p| p.as_path())
            .filter(|p| seen.insert(*p))
            .collect()
    }

    /// Window count per sequence, in index order.
    pub fn windows_per_sequence(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for window in &self.windows {
            match counts.last_mut() {
                Some((id, count)) if *id == window.sequence => *count += 1,
                _ => counts.push((window.sequence.as_str(), 1)),
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DMat4, DVec3};
    use std::path::PathBuf;

    fn sequence(id: &str, frames: usize) -> Sequence {
        let poses = (0..frames)
            .map(|i| DMat4::from_translation(DVec3::new(0.0, 0.0, i as f64)))
            .collect();
        let paths = (0..frames)
            .map(|i| PathBuf::from(format!("{id}/{i:06}.png")))
            .collect();
        Sequence::new(id, poses, paths).unwrap()
    }

    #[test]
    fn test_build_concatenates_in_order() {
        let sequences = vec![sequence("00", 11), sequence("01", 8)];
        let index = DatasetIndex::build(&sequences, WindowParams::new(5, 2, 1).unwrap()).unwrap();

        // 00: starts 0, 3, 6; 01: starts 0, 3.
        assert_eq!(index.len(), 5);
        let order: Vec<(&str, usize)> = index
            .iter()
            .map(|w| (w.sequence.as_str(), w.start))
            .collect();
        assert_eq!(order, vec![("00", 0), ("00", 3), ("00", 6), ("01", 0), ("01", 3)]);
        assert_eq!(index.windows_per_sequence(), vec![("00", 3), ("01", 2)]);
        assert!(index.iter().all(|w| w.len() == index.window_length()));
    }

    #[test]
    fn test_get_out_of_range() {
        let index = DatasetIndex::build(&[sequence("00", 6)], WindowParams::new(3, 0, 1).unwrap())
            .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(1).unwrap().start, 3);
        assert!(matches!(
            index.get(2),
            Err(DataError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_unique_paths_deduplicate_overlap() {
        let index = DatasetIndex::build(&[sequence("00", 10)], WindowParams::new(4, 3, 2).unwrap())
            .unwrap();
        let unique = index.unique_image_paths();
        assert_eq!(unique.len(), 10);
        assert_eq!(unique[0], Path::new("00/000000.png"));
        let total: usize = index.iter().map(|w| w.len()).sum();
        assert!(total > unique.len());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = WindowParams {
            length: 3,
            overlap: 3,
            repeats: 1,
        };
        assert!(DatasetIndex::build(&[sequence("00", 6)], params).is_err());
    }

    #[test]
    fn test_empty_index() {
        let index = DatasetIndex::build(&[], WindowParams::new(2, 0, 1).unwrap()).unwrap();
        assert!(index.is_empty());
        assert!(index.unique_image_paths().is_empty());
    }
}
