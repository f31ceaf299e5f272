//! Felzenszwalb-style HOG descriptor (32 features per cell).
//!
//! - Central-difference gradients per channel; the channel with the largest
//!   magnitude wins at each pixel.
//! - Orientation is snapped to one of 18 contrast-sensitive directions and
//!   the magnitude is voted bilinearly into the four nearest cells.
//! - Every cell is normalized against the four 2×2 blocks that contain it,
//!   each response truncated at 0.2.
//! - Output per cell: 18 contrast-sensitive + 9 contrast-insensitive + 4
//!   texture (block-energy) features + 1 truncation feature (always zero).
//!
//! Cells on the outer border are dropped, so the grid has
//! `(round(h/sbin) - 2) × (round(w/sbin) - 2)` cells.
//!
//! Complexity: O(W·H) per channel; memory: one histogram of 18 bins per cell.
use super::{FeatureExtractor, FeatureGrid};
use crate::image::{ColorImageF32, ImageView};

/// Number of features per HOG cell.
pub const HOG_DIMS: usize = 32;

const ORIENTATIONS: usize = 9;
const EPS: f32 = 1e-4;
const TRUNCATE: f32 = 0.2;
const TEXTURE_SCALE: f32 = 0.2357;

const UU: [f32; ORIENTATIONS] = [
    1.0000, 0.9397, 0.7660, 0.5000, 0.1736, -0.1736, -0.5000, -0.7660, -0.9397,
];
const VV: [f32; ORIENTATIONS] = [
    0.0000, 0.3420, 0.6428, 0.8660, 0.9848, 0.9848, 0.8660, 0.6428, 0.3420,
];

/// Built-in HOG extractor.
#[derive(Clone, Copy, Debug, Default)]
pub struct HogFeatures;

impl HogFeatures {
    pub fn new() -> Self {
        Self
    }
}

impl FeatureExtractor for HogFeatures {
    fn name(&self) -> &str {
        "hog-felzenszwalb"
    }

    fn dims(&self) -> usize {
        HOG_DIMS
    }

    fn extract(&self, image: &ColorImageF32, sbin: usize) -> FeatureGrid {
        compute_hog(image, sbin)
    }
}

/// Oriented-gradient histogram over `blocks_y × blocks_x` cells.
struct CellHistogram {
    blocks_y: usize,
    blocks_x: usize,
    bins: Vec<f32>,
}

impl CellHistogram {
    fn new(blocks_y: usize, blocks_x: usize) -> Self {
        Self {
            blocks_y,
            blocks_x,
            bins: vec![0.0; blocks_y * blocks_x * 2 * ORIENTATIONS],
        }
    }

    #[inline]
    fn cell(&self, y: usize, x: usize) -> &[f32] {
        let start = (y * self.blocks_x + x) * 2 * ORIENTATIONS;
        &self.bins[start..start + 2 * ORIENTATIONS]
    }

    #[inline]
    fn vote(&mut self, y: isize, x: isize, o: usize, v: f32) {
        if y < 0 || x < 0 || y as usize >= self.blocks_y || x as usize >= self.blocks_x {
            return;
        }
        let idx = (y as usize * self.blocks_x + x as usize) * 2 * ORIENTATIONS + o;
        self.bins[idx] += v;
    }

    /// Energy of the contrast-insensitive histogram of each cell.
    fn energy(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.blocks_y * self.blocks_x);
        for y in 0..self.blocks_y {
            for x in 0..self.blocks_x {
                let h = self.cell(y, x);
                let e = (0..ORIENTATIONS)
                    .map(|o| {
                        let s = h[o] + h[o + ORIENTATIONS];
                        s * s
                    })
                    .sum();
                out.push(e);
            }
        }
        out
    }
}

fn compute_hog(image: &ColorImageF32, sbin: usize) -> FeatureGrid {
    let (w, h) = (image.width(), image.height());
    if sbin == 0 || w < 3 || h < 3 {
        return FeatureGrid::zeros(0, 0, HOG_DIMS);
    }
    let blocks_y = (h as f64 / sbin as f64).round() as usize;
    let blocks_x = (w as f64 / sbin as f64).round() as usize;
    let out_y = blocks_y.saturating_sub(2);
    let out_x = blocks_x.saturating_sub(2);
    if out_y == 0 || out_x == 0 {
        return FeatureGrid::zeros(0, 0, HOG_DIMS);
    }

    let hist = accumulate_histogram(image, sbin, blocks_y, blocks_x);
    let norm = hist.energy();
    let nsum = |y: usize, x: usize| {
        norm[y * blocks_x + x]
            + norm[y * blocks_x + x + 1]
            + norm[(y + 1) * blocks_x + x]
            + norm[(y + 1) * blocks_x + x + 1]
    };

    let mut grid = FeatureGrid::zeros(out_y, out_x, HOG_DIMS);
    for y in 0..out_y {
        for x in 0..out_x {
            let n = [
                1.0 / (nsum(y + 1, x + 1) + EPS).sqrt(),
                1.0 / (nsum(y, x + 1) + EPS).sqrt(),
                1.0 / (nsum(y + 1, x) + EPS).sqrt(),
                1.0 / (nsum(y, x) + EPS).sqrt(),
            ];
            let src = hist.cell(y + 1, x + 1);
            let dst = grid.cell_mut(y, x);
            let mut t = [0.0f32; 4];

            for o in 0..2 * ORIENTATIONS {
                let mut acc = 0.0;
                for (k, nk) in n.iter().enumerate() {
                    let hk = (src[o] * nk).min(TRUNCATE);
                    acc += hk;
                    t[k] += hk;
                }
                dst[o] = 0.5 * acc;
            }
            for o in 0..ORIENTATIONS {
                let sum = src[o] + src[o + ORIENTATIONS];
                let acc: f32 = n.iter().map(|nk| (sum * nk).min(TRUNCATE)).sum();
                dst[2 * ORIENTATIONS + o] = 0.5 * acc;
            }
            for (k, tk) in t.iter().enumerate() {
                dst[3 * ORIENTATIONS + k] = TEXTURE_SCALE * tk;
            }
            dst[HOG_DIMS - 1] = 0.0;
        }
    }
    grid
}

fn accumulate_histogram(
    image: &ColorImageF32,
    sbin: usize,
    blocks_y: usize,
    blocks_x: usize,
) -> CellHistogram {
    let (w, h) = (image.width(), image.height());
    let visible_y = blocks_y * sbin;
    let visible_x = blocks_x * sbin;
    let sbin_f = sbin as f32;
    let mut hist = CellHistogram::new(blocks_y, blocks_x);

    for y in 1..visible_y.saturating_sub(1) {
        let sy = y.min(h - 2);
        for x in 1..visible_x.saturating_sub(1) {
            let sx = x.min(w - 2);

            let (mut dx, mut dy, mut v) = (0.0f32, 0.0f32, -1.0f32);
            for plane in &image.planes {
                let row = plane.row(sy);
                let cdx = row[sx + 1] - row[sx - 1];
                let cdy = plane.row(sy + 1)[sx] - plane.row(sy - 1)[sx];
                let cv = cdx * cdx + cdy * cdy;
                if cv > v {
                    dx = cdx;
                    dy = cdy;
                    v = cv;
                }
            }

            let mut best_dot = 0.0f32;
            let mut best_o = 0usize;
            for o in 0..ORIENTATIONS {
                let dot = UU[o] * dx + VV[o] * dy;
                if dot > best_dot {
                    best_dot = dot;
                    best_o = o;
                } else if -dot > best_dot {
                    best_dot = -dot;
                    best_o = o + ORIENTATIONS;
                }
            }

            let xp = (x as f32 + 0.5) / sbin_f - 0.5;
            let yp = (y as f32 + 0.5) / sbin_f - 0.5;
            let ixp = xp.floor();
            let iyp = yp.floor();
            let vx0 = xp - ixp;
            let vy0 = yp - iyp;
            let vx1 = 1.0 - vx0;
            let vy1 = 1.0 - vy0;
            let (ix, iy) = (ixp as isize, iyp as isize);
            let mag = v.max(0.0).sqrt();

            hist.vote(iy, ix, best_o, vx1 * vy1 * mag);
            hist.vote(iy, ix + 1, best_o, vx0 * vy1 * mag);
            hist.vote(iy + 1, ix, best_o, vx1 * vy0 * mag);
            hist.vote(iy + 1, ix + 1, best_o, vx0 * vy0 * mag);
        }
    }
    hist
}
