//! Per-column normalization of the training matrix.
//!
//! The grayscale block of every column is centered and scaled to unit L2
//! norm. The HOG block gets the same treatment unless whitening is active, in
//! which case it becomes `W · (v - mu)` with no further rescaling. The two
//! blocks never influence each other.
//!
//! Columns are processed in blocks to bound the temporary buffer used by the
//! whitening product; the block size has no effect on the result.
use crate::error::TrainError;
use crate::layout::PatchLayout;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::whitening::WhiteningParams;
use nalgebra::DMatrix;

/// Columns normalized per block.
pub const NORMALIZE_BLOCK_COLUMNS: usize = 100_000;

const EPS: f32 = f32::EPSILON;

/// Normalize `data` in place with the default block size.
pub fn normalize(
    data: &mut DMatrix<f32>,
    layout: &PatchLayout,
    whitening: Option<&WhiteningParams>,
    reporter: &mut dyn ProgressReporter,
) -> Result<(), TrainError> {
    normalize_in_blocks(data, layout, whitening, NORMALIZE_BLOCK_COLUMNS, reporter)
}

/// Normalize `data` in place, `block_columns` columns at a time.
pub fn normalize_in_blocks(
    data: &mut DMatrix<f32>,
    layout: &PatchLayout,
    whitening: Option<&WhiteningParams>,
    block_columns: usize,
    reporter: &mut dyn ProgressReporter,
) -> Result<(), TrainError> {
    let rows = layout.rows();
    if data.nrows() != rows {
        return Err(TrainError::DimensionMismatch {
            what: "training matrix",
            expected: (rows, data.ncols()),
            found: data.shape(),
        });
    }
    if block_columns == 0 {
        return Err(TrainError::invalid("block_columns", "must be positive"));
    }
    let gray_size = layout.gray_size();
    let hog_size = layout.hog_size();
    if let Some(params) = whitening {
        params.validate(hog_size)?;
    }

    let total = data.ncols();
    let mut start = 0;
    while start < total {
        let len = block_columns.min(total - start);
        for c in start..start + len {
            let column = &mut data.as_mut_slice()[c * rows..(c + 1) * rows];
            let (gray, hog) = column.split_at_mut(gray_size);
            center_and_scale(gray);
            if whitening.is_none() {
                center_and_scale(hog);
            }
        }
        if let Some(params) = whitening {
            let mut block = data.view((gray_size, start), (hog_size, len)).clone_owned();
            for mut col in block.column_iter_mut() {
                col -= &params.mean;
            }
            let whitened = &params.matrix * block;
            data.view_mut((gray_size, start), (hog_size, len))
                .copy_from(&whitened);
        }
        start += len;
        reporter.report(&ProgressEvent::Normalized { done: start, total });
    }
    Ok(())
}

/// Subtract the mean, then divide by `sqrt(sum of squares + eps)`.
pub fn center_and_scale(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    let mut sq = 0.0f32;
    for v in values.iter_mut() {
        *v -= mean;
        sq += *v * *v;
    }
    let inv = 1.0 / (sq + EPS).sqrt();
    for v in values.iter_mut() {
        *v *= inv;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PatchDims;
    use crate::progress::NullReporter;
    use nalgebra::DVector;

    fn layout() -> PatchLayout {
        // gray: 3x3 cells of 1 px = 9 rows, hog: 1x1x4 = 4 rows
        PatchLayout::new(PatchDims::new(1, 1), 1, 4)
    }

    fn sample_matrix(cols: usize) -> DMatrix<f32> {
        DMatrix::from_fn(13, cols, |r, c| ((r * 7 + c * 3) % 11) as f32 + 0.25 * c as f32)
    }

    #[test]
    fn unwhitened_columns_have_zero_mean_unit_norm() {
        let layout = layout();
        let mut data = sample_matrix(6);
        normalize(&mut data, &layout, None, &mut NullReporter).unwrap();
        for col in data.column_iter() {
            for block in [col.rows(0, 9), col.rows(9, 4)] {
                assert!(block.mean().abs() < 1e-5);
                assert!((block.norm() - 1.0).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn whitened_hog_is_affine_transform_only() {
        let layout = layout();
        let original = sample_matrix(5);
        let w = DMatrix::from_fn(4, 4, |r, c| if r == c { 2.0 } else { 0.1 * (r + c) as f32 });
        let mu = DVector::from_vec(vec![1.0, -1.0, 0.5, 0.0]);
        let params = WhiteningParams::new(w.clone(), mu.clone());

        let mut data = original.clone();
        normalize(&mut data, &layout, Some(&params), &mut NullReporter).unwrap();

        let mut unwhitened = original.clone();
        normalize(&mut unwhitened, &layout, None, &mut NullReporter).unwrap();

        for c in 0..original.ncols() {
            let v = original.view((9, c), (4, 1)).clone_owned();
            let expected = &w * (v - &mu);
            let got = data.view((9, c), (4, 1));
            assert!((got - &expected).amax() < 1e-5);
            // Gray block is unaffected by whitening.
            assert_eq!(data.view((0, c), (9, 1)), unwhitened.view((0, c), (9, 1)));
        }
    }

    #[test]
    fn block_size_does_not_change_result() {
        let layout = layout();
        let w = DMatrix::from_fn(4, 4, |r, c| (r as f32 - c as f32) * 0.3 + 1.0);
        let params = WhiteningParams::new(w, DVector::from_element(4, 0.2));
        for whitening in [None, Some(&params)] {
            let mut a = sample_matrix(23);
            let mut b = a.clone();
            normalize_in_blocks(&mut a, &layout, whitening, 23, &mut NullReporter).unwrap();
            normalize_in_blocks(&mut b, &layout, whitening, 4, &mut NullReporter).unwrap();
            assert!((&a - &b).amax() < 1e-6);
        }
    }

    #[test]
    fn zero_column_stays_finite() {
        let mut values = vec![0.0f32; 8];
        center_and_scale(&mut values);
        assert!(values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn mismatched_rows_are_rejected() {
        let mut data = DMatrix::<f32>::zeros(12, 3);
        assert!(normalize(&mut data, &layout(), None, &mut NullReporter).is_err());
    }
}
