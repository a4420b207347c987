//! Index-addressed access to training samples.

use crate::cache::{FileDecoder, ImageCache, ImageDecoder, PopulateReport, Resize};
use crate::config::{DatasetConfig, Split};
use crate::error::DatasetError;
use crate::transform::{ImageTensor, RuntimeTransform};
use rand::RngCore;
use seqvo_data::{DatasetIndex, RelativePose, WindowKind};
use tracing::info;

/// Random-access collection of samples.
pub trait Dataset {
    type Item;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Result<Self::Item, DatasetError>;
}

/// Identifying metadata of a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleMeta {
    /// Frames in the window.
    pub length: usize,
    pub sequence: String,
    pub kind: WindowKind,
    /// `[start, next_start]` within the sequence.
    pub id: [usize; 2],
}

/// One window's images and inter-frame motion.
#[derive(Debug, Clone)]
pub struct Sample {
    pub meta: SampleMeta,
    /// `length` transformed images in temporal order.
    pub images: Vec<ImageTensor>,
    /// `length - 1` relative poses, oldest pair first.
    pub relative_poses: Vec<RelativePose>,
}

impl Sample {
    /// Relative poses as `[tx, ty, tz, rx, ry, rz]` rows in f32.
    pub fn pose_rows(&self) -> Vec<[f32; 6]> {
        self.relative_poses.iter().map(|p| p.to_f32_array()).collect()
    }
}

/// Sample metadata split into columns, one entry per sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchMeta {
    pub lengths: Vec<usize>,
    pub sequences: Vec<String>,
    pub kinds: Vec<WindowKind>,
    pub ids: Vec<[usize; 2]>,
}

impl BatchMeta {
    pub fn from_metas<'a>(metas: impl IntoIterator<Item = &'a SampleMeta>) -> Self {
        let mut batch = Self::default();
        for meta in metas {
            batch.lengths.push(meta.length);
            batch.sequences.push(meta.sequence.clone());
            batch.kinds.push(meta.kind);
            batch.ids.push(meta.id);
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}

/// Windows of posed frames served with cached images.
///
/// Construction populates the image cache from every path the index
/// references, so a built dataset never misses the cache. Reads do not
/// mutate anything and are safe from multiple threads.
#[derive(Debug)]
pub struct SequenceDataset {
    index: DatasetIndex,
    cache: ImageCache,
    transform: RuntimeTransform,
}

impl SequenceDataset {
    /// Build a dataset, decoding every referenced image once.
    pub fn new<D: ImageDecoder + ?Sized>(
        index: DatasetIndex,
        decoder: &D,
        resize: Option<Resize>,
        transform: RuntimeTransform,
    ) -> Result<Self, DatasetError> {
        Self::with_progress(index, decoder, resize, transform, |_, _| {})
    }

    /// Like [`SequenceDataset::new`], reporting `(done, total)` decode progress.
    pub fn with_progress<D, F>(
        index: DatasetIndex,
        decoder: &D,
        resize: Option<Resize>,
        transform: RuntimeTransform,
        progress: F,
    ) -> Result<Self, DatasetError>
    where
        D: ImageDecoder + ?Sized,
        F: FnMut(usize, usize),
    {
        info!("Pre-runtime resize: {:?}", resize);
        info!("Runtime transform: {}", transform.describe());

        let mut cache = ImageCache::new(resize);
        let report: PopulateReport =
            cache.populate(index.unique_image_paths(), decoder, progress)?;
        info!(
            "Dataset ready: {} samples over {} cached images ({:.2}s preprocessing)",
            index.len(),
            report.decoded,
            report.elapsed.as_secs_f64()
        );

        Ok(Self {
            index,
            cache,
            transform,
        })
    }

    /// Load the configured sequences of `split` from disk and build a dataset.
    pub fn from_config(
        config: &DatasetConfig,
        split: Split,
        training: bool,
    ) -> Result<Self, DatasetError> {
        config.validate()?;
        let sequences = config
            .sequence_source()
            .load_all(config.sequences(split))?;
        let index = DatasetIndex::build(&sequences, config.window)?;
        Self::new(
            index,
            &FileDecoder,
            config.resize(),
            config.runtime_transform(training)?,
        )
    }

    pub fn index(&self) -> &DatasetIndex {
        &self.index
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn transform(&self) -> &RuntimeTransform {
        &self.transform
    }

    /// Sample `index`, drawing augmentation randomness from `rng`.
    pub fn get_with_rng<R: RngCore>(&self, index: usize, rng: &mut R) -> Result<Sample, DatasetError> {
        let window = self.index.get(index)?;
        let relative_poses = window.relative_poses()?;

        let mut images = Vec::with_capacity(window.len());
        for path in &window.image_paths {
            let base = self.cache.get(path)?;
            images.push(self.transform.apply(&base, &mut *rng));
        }

        Ok(Sample {
            meta: SampleMeta {
                length: window.len(),
                sequence: window.sequence.clone(),
                kind: window.kind,
                id: window.id(),
            },
            images,
            relative_poses,
        })
    }
}

impl Dataset for SequenceDataset {
    type Item = Sample;

    fn len(&self) -> usize {
        self.index.len()
    }

    fn get(&self, index: usize) -> Result<Sample, DatasetError> {
        self.get_with_rng(index, &mut rand::rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::CountingDecoder;
    use crate::transform::{ColorJitter, Normalize};
    use glam::{DMat3, DMat4, DVec3};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use seqvo_data::pose::from_parts;
    use seqvo_data::{DataError, Sequence, WindowParams};
    use std::path::PathBuf;

    fn circle(id: &str, frames: usize) -> Sequence {
        let poses = (0..frames)
            .map(|i| {
                let yaw = 0.1 * i as f64;
                from_parts(DMat3::from_rotation_z(yaw), DVec3::new(yaw.cos(), yaw.sin(), 0.0))
            })
            .collect();
        let paths = (0..frames)
            .map(|i| PathBuf::from(format!("{id}/{i:06}.png")))
            .collect();
        Sequence::new(id, poses, paths).unwrap()
    }

    fn dataset(params: WindowParams, transform: RuntimeTransform) -> (SequenceDataset, CountingDecoder) {
        let index = DatasetIndex::build(&[circle("00", 11), circle("01", 8)], params).unwrap();
        let decoder = CountingDecoder::default();
        let dataset = SequenceDataset::new(index, &decoder, Some(Resize::new(4, 2)), transform).unwrap();
        (dataset, decoder)
    }

    #[test]
    fn test_sample_shapes_and_meta() {
        let (dataset, _) = dataset(WindowParams::new(5, 2, 1).unwrap(), RuntimeTransform::evaluation());
        assert_eq!(dataset.len(), 5);

        let sample = dataset.get(1).unwrap();
        assert_eq!(sample.meta.length, 5);
        assert_eq!(sample.meta.sequence, "00");
        assert_eq!(sample.meta.kind, WindowKind::Normal);
        assert_eq!(sample.meta.id, [3, 6]);
        assert_eq!(sample.images.len(), 5);
        assert!(sample.images.iter().all(|img| img.shape() == [3, 2, 4]));
        assert_eq!(sample.relative_poses.len(), 4);
        assert_eq!(sample.pose_rows().len(), 4);
    }

    #[test]
    fn test_relative_poses_follow_circle() {
        let (dataset, _) = dataset(WindowParams::new(3, 0, 1).unwrap(), RuntimeTransform::evaluation());
        let sample = dataset.get(0).unwrap();
        for pose in &sample.relative_poses {
            assert!((pose.rotation - DVec3::new(0.0, 0.0, 0.1)).length() < 1e-9);
            // Chord of a unit circle subtending 0.1 rad.
            assert!((pose.translation.length() - 2.0 * 0.05f64.sin()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_each_frame_decoded_once() {
        // Heavy overlap plus two tilings: frames are referenced many times.
        let (dataset, decoder) = dataset(WindowParams::new(4, 3, 2).unwrap(), RuntimeTransform::evaluation());
        assert_eq!(decoder.calls(), 19);
        assert_eq!(dataset.cache().len(), 19);
        let references: usize = dataset.index().iter().map(|w| w.len()).sum();
        assert!(references > 19);
    }

    #[test]
    fn test_out_of_range() {
        let (dataset, _) = dataset(WindowParams::new(5, 2, 1).unwrap(), RuntimeTransform::evaluation());
        assert!(matches!(
            dataset.get(5),
            Err(DatasetError::Data(DataError::IndexOutOfRange { index: 5, len: 5 }))
        ));
        // The dataset stays usable after a failed call.
        assert!(dataset.get(4).is_ok());
    }

    #[test]
    fn test_augmentation_varies_but_base_is_shared() {
        let jitter = ColorJitter::new(0.5, 0.5, 0.5, 0.2).unwrap();
        let transform = RuntimeTransform::evaluation().with_op(jitter);
        let (dataset, decoder) = dataset(WindowParams::new(2, 0, 1).unwrap(), transform);

        let mut rng = StdRng::seed_from_u64(3);
        let first = dataset.get_with_rng(0, &mut rng).unwrap();
        let draws: Vec<Sample> = (0..6).map(|_| dataset.get_with_rng(0, &mut rng).unwrap()).collect();
        assert!(draws.iter().any(|s| s.images[0] != first.images[0]));

        let mut again = StdRng::seed_from_u64(3);
        let replay = dataset.get_with_rng(0, &mut again).unwrap();
        assert_eq!(replay.images, first.images);

        let frames = dataset.index().unique_image_paths().len();
        assert_eq!(decoder.calls(), frames);
    }

    #[test]
    fn test_recentering_and_normalization() {
        let transform = RuntimeTransform::evaluation()
            .with_minus_point_5(true)
            .with_normalize(Normalize::new([0.1, 0.1, 0.1], [2.0, 2.0, 2.0]).unwrap());
        let (dataset, _) = dataset(WindowParams::new(2, 0, 1).unwrap(), transform);
        let sample = dataset.get(0).unwrap();

        let base = dataset.cache().get(&dataset.index().get(0).unwrap().image_paths[0]).unwrap();
        let expected = (base.get_pixel(0, 0)[1] as f32 / 255.0 - 0.5 - 0.1) / 2.0;
        let plane = sample.images[0].channel(1);
        assert!((plane[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_batch_meta_columns() {
        let (dataset, _) = dataset(WindowParams::new(5, 2, 1).unwrap(), RuntimeTransform::evaluation());
        let samples: Vec<Sample> = (0..dataset.len()).map(|i| dataset.get(i).unwrap()).collect();
        let batch = BatchMeta::from_metas(samples.iter().map(|s| &s.meta));

        assert_eq!(batch.len(), 5);
        assert_eq!(batch.lengths, vec![5; 5]);
        assert_eq!(batch.sequences, vec!["00", "00", "00", "01", "01"]);
        assert_eq!(batch.ids[4], [3, 6]);
    }

    #[test]
    fn test_concurrent_reads() {
        let (dataset, _) = dataset(WindowParams::new(3, 1, 1).unwrap(), RuntimeTransform::evaluation());
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for i in 0..dataset.len() {
                        assert_eq!(dataset.get(i).unwrap().images.len(), 3);
                    }
                });
            }
        });
    }

    #[test]
    fn test_singular_pose_surfaces_at_access() {
        let mut poses = vec![DMat4::IDENTITY; 3];
        poses[0] = DMat4::ZERO;
        let paths = (0..3).map(|i| PathBuf::from(format!("{i}.png"))).collect();
        let sequence = Sequence::new("broken", poses, paths).unwrap();
        let index = DatasetIndex::build(&[sequence], WindowParams::new(3, 0, 1).unwrap()).unwrap();
        let dataset =
            SequenceDataset::new(index, &CountingDecoder::default(), None, RuntimeTransform::evaluation())
                .unwrap();

        assert!(matches!(
            dataset.get(0),
            Err(DatasetError::Data(DataError::SingularPose { frame: 0, .. }))
        ));
    }
}
