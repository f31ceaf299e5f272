//! Dense per-cell feature extraction.
//!
//! A [`FeatureExtractor`] turns a 3-channel image into a grid of cells of
//! `sbin × sbin` pixels, each described by a fixed number of features. The
//! harvester only relies on this contract; [`HogFeatures`] is the built-in
//! implementation.
pub mod hog;

pub use self::hog::{HogFeatures, HOG_DIMS};

use crate::image::ColorImageF32;

/// Image → dense grid of fixed-dimension feature vectors.
pub trait FeatureExtractor {
    /// Identifier recorded in trained models.
    fn name(&self) -> &str;
    /// Number of features per cell; constant for the extractor.
    fn dims(&self) -> usize;
    /// Extract the feature grid at bin size `sbin`.
    fn extract(&self, image: &ColorImageF32, sbin: usize) -> FeatureGrid;
}

/// Grid of `h × w` cells with `dims` features each, stored cell-row-major
/// with the feature index innermost.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureGrid {
    pub h: usize,
    pub w: usize,
    pub dims: usize,
    pub data: Vec<f32>,
}

impl FeatureGrid {
    pub fn zeros(h: usize, w: usize, dims: usize) -> Self {
        Self {
            h,
            w,
            dims,
            data: vec![0.0; h * w * dims],
        }
    }

    #[inline]
    pub fn cell(&self, y: usize, x: usize) -> &[f32] {
        let start = (y * self.w + x) * self.dims;
        &self.data[start..start + self.dims]
    }

    #[inline]
    pub fn cell_mut(&mut self, y: usize, x: usize) -> &mut [f32] {
        let start = (y * self.w + x) * self.dims;
        &mut self.data[start..start + self.dims]
    }

    /// Flatten the `ny × nx` window of cells anchored at `(y0, x0)` into `out`.
    pub fn copy_window(&self, y0: usize, x0: usize, ny: usize, nx: usize, out: &mut [f32]) {
        debug_assert!(y0 + ny <= self.h && x0 + nx <= self.w);
        debug_assert_eq!(out.len(), ny * nx * self.dims);
        let row_len = nx * self.dims;
        for (dy, dst) in out.chunks_exact_mut(row_len).enumerate() {
            let start = ((y0 + dy) * self.w + x0) * self.dims;
            dst.copy_from_slice(&self.data[start..start + row_len]);
        }
    }
}
