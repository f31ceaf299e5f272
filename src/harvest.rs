//! Harvesting of aligned (grayscale, HOG) training windows.
//!
//! The harvester scans a stream of images, computes the feature grid of each
//! one and cuts every window that fits into a training column:
//!
//! - rows `[0, gray_size)`: the pixel window covering the HOG window plus one
//!   cell of context on each side, flattened row-major;
//! - rows `[gray_size, rows)`: the `ny × nx` HOG window, flattened with the
//!   feature index innermost.
//!
//! Below [`DENSE_HARVEST_THRESHOLD`] requested columns, each candidate window
//! is kept with probability [`KEEP_PROBABILITY`] to decorrelate overlapping
//! windows; above it every window is kept. The stream is re-read from the
//! start until the matrix is full, bounded by `max_passes`.
use crate::error::TrainError;
use crate::features::{FeatureExtractor, FeatureGrid};
use crate::image::{ColorImageF32, ImageF32, ImageView};
use crate::layout::{PatchDims, PatchLayout};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::stream::ImageStream;
use nalgebra::DMatrix;
use rand::Rng;

/// Requested column count from which every candidate window is kept.
pub const DENSE_HARVEST_THRESHOLD: usize = 1_000_000;
/// Probability of keeping a candidate window in sparse mode.
pub const KEEP_PROBABILITY: f64 = 0.05;
pub const DEFAULT_MAX_PASSES: usize = 10_000;
/// 16 GiB.
pub const DEFAULT_MAX_BYTES: u128 = 16 << 30;

#[derive(Clone, Debug)]
pub struct HarvestOptions {
    /// Number of columns to fill.
    pub target: usize,
    pub patch: PatchDims,
    pub sbin: usize,
    pub dense_threshold: usize,
    pub keep_probability: f64,
    /// Upper bound on passes over the stream, first pass included.
    pub max_passes: usize,
    /// Upper bound on the training matrix footprint in bytes.
    pub max_bytes: u128,
}

impl HarvestOptions {
    pub fn new(target: usize, patch: PatchDims, sbin: usize) -> Self {
        Self {
            target,
            patch,
            sbin,
            dense_threshold: DENSE_HARVEST_THRESHOLD,
            keep_probability: KEEP_PROBABILITY,
            max_passes: DEFAULT_MAX_PASSES,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u128) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_dense_threshold(mut self, dense_threshold: usize) -> Self {
        self.dense_threshold = dense_threshold;
        self
    }

    /// Whether every candidate window is kept.
    pub fn is_dense(&self) -> bool {
        self.target >= self.dense_threshold
    }
}

/// Filled training matrix plus provenance.
#[derive(Clone, Debug)]
pub struct Harvest {
    /// `rows × target` matrix, every column populated.
    pub data: DMatrix<f32>,
    /// Prefix of the stream that was visited, in stream order.
    pub images: Vec<String>,
    /// Number of passes over the stream, the partial last one included.
    pub passes: usize,
}

/// Fill a training matrix with `options.target` aligned windows.
pub fn harvest<S, F, R>(
    stream: &S,
    extractor: &F,
    options: &HarvestOptions,
    rng: &mut R,
    reporter: &mut dyn ProgressReporter,
) -> Result<Harvest, TrainError>
where
    S: ImageStream + ?Sized,
    F: FeatureExtractor + ?Sized,
    R: Rng + ?Sized,
{
    if !(options.keep_probability > 0.0 && options.keep_probability <= 1.0) {
        return Err(TrainError::invalid(
            "keep_probability",
            format!("{} is not in (0, 1]", options.keep_probability),
        ));
    }
    let layout = PatchLayout::new(options.patch, options.sbin, extractor.dims());
    let rows = layout.rows();
    let target = options.target;
    let mut data = allocate_store(rows, target, options.max_bytes, reporter)?;
    if target == 0 {
        return Ok(Harvest {
            data,
            images: Vec::new(),
            passes: 0,
        });
    }
    if stream.is_empty() {
        return Err(TrainError::EmptyStream);
    }

    let dense = options.is_dense();
    let mut filled = 0usize;
    let mut furthest = 0usize;
    let mut pass = 1usize;
    loop {
        let mut candidates = 0usize;
        for index in 0..stream.len() {
            furthest = furthest.max(index);
            let gray = stream.load(index)?;
            let grid = extractor.extract(&ColorImageF32::replicate_gray(&gray), options.sbin);
            for (y0, x0) in candidate_windows(&gray, &grid, &layout) {
                candidates += 1;
                if !dense && !rng.gen_bool(options.keep_probability) {
                    continue;
                }
                let column = &mut data.as_mut_slice()[filled * rows..(filled + 1) * rows];
                write_pair(&gray, &grid, &layout, y0, x0, column);
                filled += 1;
                if filled == target {
                    reporter.report(&ProgressEvent::ImageHarvested {
                        pass,
                        image_index: index,
                        image_count: stream.len(),
                        filled,
                        target,
                    });
                    let images = (0..=furthest).map(|i| stream.name(i)).collect();
                    return Ok(Harvest {
                        data,
                        images,
                        passes: pass,
                    });
                }
            }
            reporter.report(&ProgressEvent::ImageHarvested {
                pass,
                image_index: index,
                image_count: stream.len(),
                filled,
                target,
            });
        }

        if candidates == 0 || pass >= options.max_passes {
            return Err(TrainError::InsufficientSamples {
                filled,
                target,
                passes: pass,
            });
        }
        pass += 1;
        reporter.report(&ProgressEvent::Wraparound {
            pass,
            filled,
            target,
        });
    }
}

/// Top-left cell offsets `(y, x)` of every window that fits both the feature
/// grid and, with its context border, the pixel image. Rows outer, columns
/// inner.
pub fn candidate_windows<'a>(
    gray: &'a ImageF32,
    grid: &'a FeatureGrid,
    layout: &'a PatchLayout,
) -> impl Iterator<Item = (usize, usize)> + 'a {
    let PatchDims { ny, nx } = layout.patch;
    let rows = (grid.h + 1).saturating_sub(ny);
    let cols = (grid.w + 1).saturating_sub(nx);
    (0..rows).flat_map(move |y0| {
        (0..cols)
            .filter(move |&x0| {
                gray.contains_window(
                    x0 * layout.sbin,
                    y0 * layout.sbin,
                    layout.gray_width(),
                    layout.gray_height(),
                )
            })
            .map(move |x0| (y0, x0))
    })
}

/// Write the training column of the window at cell `(y0, x0)` into `out`.
pub fn write_pair(
    gray: &ImageF32,
    grid: &FeatureGrid,
    layout: &PatchLayout,
    y0: usize,
    x0: usize,
    out: &mut [f32],
) {
    let (gray_part, hog_part) = out.split_at_mut(layout.gray_size());
    gray.copy_window(
        x0 * layout.sbin,
        y0 * layout.sbin,
        layout.gray_width(),
        layout.gray_height(),
        gray_part,
    );
    grid.copy_window(y0, x0, layout.patch.ny, layout.patch.nx, hog_part);
}

fn allocate_store(
    rows: usize,
    columns: usize,
    max_bytes: u128,
    reporter: &mut dyn ProgressReporter,
) -> Result<DMatrix<f32>, TrainError> {
    let bytes = rows as u128 * columns as u128 * std::mem::size_of::<f32>() as u128;
    reporter.report(&ProgressEvent::Allocating {
        rows,
        columns,
        bytes,
    });
    if bytes > max_bytes {
        return Err(TrainError::AllocationTooLarge {
            bytes,
            limit: max_bytes,
        });
    }
    let len = rows.checked_mul(columns).ok_or(TrainError::OutOfMemory {
        bytes: usize::MAX,
    })?;
    let mut buf: Vec<f32> = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| TrainError::OutOfMemory { bytes: bytes as usize })?;
    buf.resize(len, 0.0);
    Ok(DMatrix::from_vec(rows, columns, buf))
}
