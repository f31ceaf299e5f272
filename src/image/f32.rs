//! Owned f32 images in row-major layout (stride == width).
//!
//! `ImageF32` holds grayscale intensities in [0, 1]. `ColorImageF32` stacks
//! three planes and is what the feature extractor consumes; training only
//! ever builds it by replicating a grayscale plane.
use super::traits::ImageView;

#[derive(Clone, Debug, PartialEq)]
pub struct ImageF32 {
    /// Image width in pixels
    pub w: usize,
    /// Image height in pixels
    pub h: usize,
    /// Backing storage in row-major order
    pub data: Vec<f32>,
}

impl ImageF32 {
    /// Construct a zero-initialized buffer of size `w × h`.
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0.0; w * h],
        }
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn<F: FnMut(usize, usize) -> f32>(w: usize, h: usize, mut f: F) -> Self {
        let mut data = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                data.push(f(x, y));
            }
        }
        Self { w, h, data }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.w + x
    }
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.idx(x, y)]
    }
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    /// Copy the `w × h` window at `(x0, y0)` row by row into `out`.
    ///
    /// `out` must hold exactly `w * h` values and the window must lie inside
    /// the image.
    pub fn copy_window(&self, x0: usize, y0: usize, w: usize, h: usize, out: &mut [f32]) {
        debug_assert!(self.contains_window(x0, y0, w, h));
        debug_assert_eq!(out.len(), w * h);
        for (dy, dst) in out.chunks_exact_mut(w).enumerate() {
            let row = self.row(y0 + dy);
            dst.copy_from_slice(&row[x0..x0 + w]);
        }
    }
}

impl ImageView for ImageF32 {
    type Pixel = f32;

    #[inline]
    fn width(&self) -> usize {
        self.w
    }
    #[inline]
    fn height(&self) -> usize {
        self.h
    }
    #[inline]
    fn row(&self, y: usize) -> &[f32] {
        let start = y * self.w;
        &self.data[start..start + self.w]
    }
}

/// Three equally sized f32 planes.
#[derive(Clone, Debug)]
pub struct ColorImageF32 {
    pub planes: [ImageF32; 3],
}

impl ColorImageF32 {
    /// Replicate a grayscale image into all three channels.
    pub fn replicate_gray(gray: &ImageF32) -> Self {
        Self {
            planes: [gray.clone(), gray.clone(), gray.clone()],
        }
    }

    pub fn width(&self) -> usize {
        self.planes[0].w
    }

    pub fn height(&self) -> usize {
        self.planes[0].h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_window_reads_rows_in_order() {
        let img = ImageF32::from_fn(6, 4, |x, y| (y * 10 + x) as f32);
        let mut out = vec![0.0; 6];
        img.copy_window(2, 1, 3, 2, &mut out);
        assert_eq!(out, vec![12.0, 13.0, 14.0, 22.0, 23.0, 24.0]);
    }

    #[test]
    fn rows_iterate_top_to_bottom() {
        let img = ImageF32::from_fn(2, 3, |_, y| y as f32);
        let firsts: Vec<f32> = img.rows().map(|r| r[0]).collect();
        assert_eq!(firsts, vec![0.0, 1.0, 2.0]);
    }
}
