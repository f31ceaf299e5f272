//! Shapes of paired training vectors.
use serde::{Deserialize, Serialize};

/// Patch size in HOG cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchDims {
    pub ny: usize,
    pub nx: usize,
}

impl PatchDims {
    pub fn new(ny: usize, nx: usize) -> Self {
        Self { ny, nx }
    }
}

impl Default for PatchDims {
    fn default() -> Self {
        Self { ny: 5, nx: 5 }
    }
}

/// Row layout of a training column: grayscale block followed by HOG block.
///
/// The grayscale block spans the HOG window plus one cell of context on
/// every side, i.e. `(ny + 2) × (nx + 2)` cells of `sbin × sbin` pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchLayout {
    pub patch: PatchDims,
    pub sbin: usize,
    pub feature_dims: usize,
}

impl PatchLayout {
    pub fn new(patch: PatchDims, sbin: usize, feature_dims: usize) -> Self {
        Self {
            patch,
            sbin,
            feature_dims,
        }
    }

    /// Pixel height of the grayscale window.
    pub fn gray_height(&self) -> usize {
        (self.patch.ny + 2) * self.sbin
    }

    /// Pixel width of the grayscale window.
    pub fn gray_width(&self) -> usize {
        (self.patch.nx + 2) * self.sbin
    }

    pub fn gray_size(&self) -> usize {
        self.gray_height() * self.gray_width()
    }

    pub fn hog_size(&self) -> usize {
        self.patch.ny * self.patch.nx * self.feature_dims
    }

    /// Total rows of a training column.
    pub fn rows(&self) -> usize {
        self.gray_size() + self.hog_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_patch_formulas() {
        for (ny, nx, sbin, f) in [(1, 1, 1, 1), (5, 5, 8, 32), (3, 7, 4, 31), (2, 9, 6, 32)] {
            let layout = PatchLayout::new(PatchDims::new(ny, nx), sbin, f);
            assert_eq!(layout.gray_size(), (ny + 2) * (nx + 2) * sbin * sbin);
            assert_eq!(layout.hog_size(), ny * nx * f);
            assert!(layout.gray_size() > 0 && layout.hog_size() > 0);
            assert_eq!(layout.rows(), layout.gray_size() + layout.hog_size());
        }
    }

    #[test]
    fn default_patch_is_five_by_five() {
        let layout = PatchLayout::new(PatchDims::default(), 8, 32);
        assert_eq!(layout.gray_size(), 49 * 64);
        assert_eq!(layout.hog_size(), 800);
    }
}
