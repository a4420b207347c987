//! Decode-once image cache shared by every window that references a frame.
//!
//! Overlapping windows and repeated tilings reference the same frame many
//! times. The cache decodes and resizes each distinct path once, so the work
//! scales with the number of frames rather than the number of windows.

use crate::error::DatasetError;
use image::RgbImage;
use image::imageops::{self, FilterType};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Paths decoded per parallel batch between progress reports.
const POPULATE_BATCH: usize = 64;

/// A decoded, pre-resized frame. Shared read-only by all windows.
pub type CachedImage = Arc<RgbImage>;

/// Source of decoded frames.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<RgbImage, DatasetError>;
}

/// Decodes frames from disk with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoder;

impl ImageDecoder for FileDecoder {
    fn decode(&self, path: &Path) -> Result<RgbImage, DatasetError> {
        let image = image::open(path).map_err(|source| DatasetError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(image.to_rgb8())
    }
}

/// Deterministic resize applied once before caching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
    pub filter: FilterType,
}

impl Resize {
    /// Bilinear resize to `width` x `height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            filter: FilterType::Triangle,
        }
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn apply(&self, image: RgbImage) -> RgbImage {
        if image.dimensions() == (self.width, self.height) {
            return image;
        }
        imageops::resize(&image, self.width, self.height, self.filter)
    }
}

/// Outcome of one [`ImageCache::populate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulateReport {
    /// Distinct paths passed in.
    pub requested: usize,
    /// Paths decoded by this call.
    pub decoded: usize,
    /// Paths already present.
    pub skipped: usize,
    pub elapsed: Duration,
}

/// Path-keyed store of decoded, resized frames.
///
/// Entries are written once and never replaced. Population takes `&mut self`,
/// so two populations can never race on the same key; reads take `&self` and
/// may run from any number of threads.
#[derive(Debug, Default)]
pub struct ImageCache {
    images: HashMap<PathBuf, CachedImage>,
    resize: Option<Resize>,
}

impl ImageCache {
    pub fn new(resize: Option<Resize>) -> Self {
        Self {
            images: HashMap::new(),
            resize,
        }
    }

    pub fn resize(&self) -> Option<&Resize> {
        self.resize.as_ref()
    }

    /// Decode and resize every path not yet cached.
    ///
    /// Duplicates in `paths` and paths already cached are skipped. Decoding
    /// runs in parallel batches; `progress` receives `(done, total)` after
    /// each batch. Nothing from a failing batch is inserted.
    #[tracing::instrument(skip_all)]
    pub fn populate<'a, I, D, F>(
        &mut self,
        paths: I,
        decoder: &D,
        mut progress: F,
    ) -> Result<PopulateReport, DatasetError>
    where
        I: IntoIterator<Item = &'a Path>,
        D: ImageDecoder + ?Sized,
        F: FnMut(usize, usize),
    {
        let started = Instant::now();
        let mut seen = HashSet::new();
        let mut requested = 0;
        let mut pending = Vec::new();
        for path in paths {
            if !seen.insert(path) {
                continue;
            }
            requested += 1;
            if !self.images.contains_key(path) {
                pending.push(path);
            }
        }

        let total = pending.len();
        let resize = self.resize;
        let mut done = 0;
        for batch in pending.chunks(POPULATE_BATCH) {
            let decoded = batch
                .par_iter()
                .map(|path| {
                    let image = decoder.decode(path)?;
                    let image = match resize {
                        Some(resize) => resize.apply(image),
                        None => image,
                    };
                    Ok((path.to_path_buf(), Arc::new(image)))
                })
                .collect::<Result<Vec<_>, DatasetError>>()?;
            self.images.extend(decoded);
            done += batch.len();
            progress(done, total);
        }

        let report = PopulateReport {
            requested,
            decoded: total,
            skipped: requested - total,
            elapsed: started.elapsed(),
        };
        info!(
            "Image cache: decoded {} of {} images ({} cached already) in {:.2}s",
            report.decoded,
            report.requested,
            report.skipped,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    /// Populate with progress reported through `tracing` at debug level.
    pub fn populate_logged<'a, I, D>(
        &mut self,
        paths: I,
        decoder: &D,
    ) -> Result<PopulateReport, DatasetError>
    where
        I: IntoIterator<Item = &'a Path>,
        D: ImageDecoder + ?Sized,
    {
        self.populate(paths, decoder, |done, total| {
            debug!(
                "Processed {}/{} ({:.2}%)",
                done,
                total,
                done as f64 / total.max(1) as f64 * 100.0
            );
        })
    }

    /// Cached frame for `path`.
    pub fn get(&self, path: &Path) -> Result<CachedImage, DatasetError> {
        self.images
            .get(path)
            .cloned()
            .ok_or_else(|| DatasetError::MissingCacheEntry(path.to_path_buf()))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.images.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
