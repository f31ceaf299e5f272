//! Whitening of the HOG modality.
//!
//! Whitening is all-or-nothing: a [`WhiteningParams`] always carries both the
//! decorrelation matrix and the mean it is applied around. The trainer picks
//! its source from [`WhiteningConfig`]; [`CovarianceWhitener`] is the
//! built-in estimator used for [`WhiteningConfig::AutoEstimate`].
use crate::error::TrainError;
use crate::features::FeatureExtractor;
use crate::image::ColorImageF32;
use crate::layout::PatchDims;
use crate::stream::ImageStream;
use log::{debug, info};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::{Deserialize, Serialize};

/// Decorrelation matrix `W` and mean `mu`; a HOG block `v` maps to
/// `W · (v - mu)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WhiteningParams {
    pub matrix: DMatrix<f32>,
    pub mean: DVector<f32>,
}

impl WhiteningParams {
    pub fn new(matrix: DMatrix<f32>, mean: DVector<f32>) -> Self {
        Self { matrix, mean }
    }

    /// Pair up optional parts: both present or both absent.
    pub fn from_parts(
        matrix: Option<DMatrix<f32>>,
        mean: Option<DVector<f32>>,
    ) -> Result<Option<Self>, TrainError> {
        match (matrix, mean) {
            (Some(matrix), Some(mean)) => Ok(Some(Self { matrix, mean })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(TrainError::WhiteningIncomplete { missing: "mean" }),
            (None, Some(_)) => Err(TrainError::WhiteningIncomplete { missing: "matrix" }),
        }
    }

    /// Build from a row-major nested matrix and a mean vector.
    pub fn from_rows(rows: &[Vec<f32>], mean: Vec<f32>) -> Result<Self, TrainError> {
        Ok(Self {
            matrix: matrix_from_rows(rows)?,
            mean: DVector::from_vec(mean),
        })
    }

    /// Check both parts against the HOG block size.
    pub fn validate(&self, hog_size: usize) -> Result<(), TrainError> {
        if self.matrix.shape() != (hog_size, hog_size) {
            return Err(TrainError::DimensionMismatch {
                what: "whitening matrix",
                expected: (hog_size, hog_size),
                found: self.matrix.shape(),
            });
        }
        if self.mean.len() != hog_size {
            return Err(TrainError::DimensionMismatch {
                what: "whitening mean",
                expected: (hog_size, 1),
                found: (self.mean.len(), 1),
            });
        }
        Ok(())
    }
}

/// Convert a row-major nested matrix, rejecting ragged rows.
pub fn matrix_from_rows(rows: &[Vec<f32>]) -> Result<DMatrix<f32>, TrainError> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);
    if let Some(bad) = rows.iter().find(|r| r.len() != ncols) {
        return Err(TrainError::DimensionMismatch {
            what: "whitening matrix row",
            expected: (1, ncols),
            found: (1, bad.len()),
        });
    }
    Ok(DMatrix::from_fn(nrows, ncols, |r, c| rows[r][c]))
}

/// Source of the whitening transform for a training run.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum WhiteningConfig {
    #[default]
    Disabled,
    Provided(WhiteningParams),
    AutoEstimate,
}

impl WhiteningConfig {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, WhiteningConfig::Disabled)
    }
}

/// Produces whitening parameters sized to the HOG block of `patch`.
pub trait WhiteningEstimator {
    fn estimate(&mut self, patch: PatchDims, hog_size: usize)
        -> Result<WhiteningParams, TrainError>;
}

#[derive(Clone, Copy, Debug)]
pub struct CovarianceOptions {
    pub sbin: usize,
    /// Cap on HOG windows used for the covariance.
    pub max_samples: usize,
    /// Ridge added to the covariance diagonal.
    pub regularizer: f32,
}

impl Default for CovarianceOptions {
    fn default() -> Self {
        Self {
            sbin: 8,
            max_samples: 20_000,
            regularizer: 0.01,
        }
    }
}

/// Estimates `W = (C + r·I)^{-1/2}` from HOG windows of an image stream.
pub struct CovarianceWhitener<'a, S: ?Sized, F: ?Sized> {
    stream: &'a S,
    extractor: &'a F,
    options: CovarianceOptions,
}

impl<'a, S, F> CovarianceWhitener<'a, S, F>
where
    S: ImageStream + ?Sized,
    F: FeatureExtractor + ?Sized,
{
    pub fn new(stream: &'a S, extractor: &'a F, options: CovarianceOptions) -> Self {
        Self {
            stream,
            extractor,
            options,
        }
    }

    fn collect_samples(&self, patch: PatchDims, hog_size: usize) -> Result<Vec<f32>, TrainError> {
        let mut samples = Vec::new();
        let mut count = 0usize;
        'images: for index in 0..self.stream.len() {
            let gray = self.stream.load(index)?;
            let grid = self
                .extractor
                .extract(&ColorImageF32::replicate_gray(&gray), self.options.sbin);
            let rows = (grid.h + 1).saturating_sub(patch.ny);
            let cols = (grid.w + 1).saturating_sub(patch.nx);
            for y0 in 0..rows {
                for x0 in 0..cols {
                    if count == self.options.max_samples {
                        break 'images;
                    }
                    let start = samples.len();
                    samples.resize(start + hog_size, 0.0);
                    grid.copy_window(y0, x0, patch.ny, patch.nx, &mut samples[start..]);
                    count += 1;
                }
            }
            debug!("whitening: {} samples after image {}", count, index + 1);
        }
        Ok(samples)
    }
}

impl<'a, S, F> WhiteningEstimator for CovarianceWhitener<'a, S, F>
where
    S: ImageStream + ?Sized,
    F: FeatureExtractor + ?Sized,
{
    fn estimate(
        &mut self,
        patch: PatchDims,
        hog_size: usize,
    ) -> Result<WhiteningParams, TrainError> {
        let expected = patch.ny * patch.nx * self.extractor.dims();
        if expected != hog_size {
            return Err(TrainError::DimensionMismatch {
                what: "whitening block",
                expected: (expected, expected),
                found: (hog_size, hog_size),
            });
        }
        let samples = self.collect_samples(patch, hog_size)?;
        let m = samples.len() / hog_size.max(1);
        if m < 2 {
            return Err(TrainError::InsufficientSamples {
                filled: m,
                target: 2,
                passes: 1,
            });
        }
        info!("estimating whitening from {} HOG windows", m);

        let mut x = DMatrix::from_vec(hog_size, m, samples);
        let mean = x.column_mean();
        for mut col in x.column_iter_mut() {
            col -= &mean;
        }
        let mut cov = (&x * x.transpose()) / (m - 1) as f32;
        for i in 0..hog_size {
            cov[(i, i)] += self.options.regularizer;
        }
        let eig = SymmetricEigen::new(cov);
        let inv_sqrt = eig.eigenvalues.map(|l| 1.0 / l.max(f32::EPSILON).sqrt());
        let scaled = &eig.eigenvectors * DMatrix::from_diagonal(&inv_sqrt);
        let matrix = scaled * eig.eigenvectors.transpose();
        Ok(WhiteningParams { matrix, mean })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::HogFeatures;
    use crate::image::ImageF32;
    use crate::stream::InMemoryStream;

    #[test]
    fn parts_must_come_together() {
        let m = DMatrix::<f32>::identity(2, 2);
        let v = DVector::<f32>::zeros(2);
        assert!(WhiteningParams::from_parts(Some(m.clone()), Some(v.clone()))
            .unwrap()
            .is_some());
        assert!(WhiteningParams::from_parts(None, None).unwrap().is_none());
        assert!(matches!(
            WhiteningParams::from_parts(Some(m), None),
            Err(TrainError::WhiteningIncomplete { missing: "mean" })
        ));
        assert!(matches!(
            WhiteningParams::from_parts(None, Some(v)),
            Err(TrainError::WhiteningIncomplete { missing: "matrix" })
        ));
    }

    #[test]
    fn validate_rejects_wrong_shapes() {
        let params = WhiteningParams::new(DMatrix::zeros(5, 4), DVector::zeros(4));
        assert!(matches!(
            params.validate(4),
            Err(TrainError::DimensionMismatch {
                what: "whitening matrix",
                found: (5, 4),
                ..
            })
        ));
        let params = WhiteningParams::new(DMatrix::zeros(4, 4), DVector::zeros(3));
        assert!(params.validate(4).is_err());
        let params = WhiteningParams::new(DMatrix::zeros(4, 4), DVector::zeros(4));
        assert!(params.validate(4).is_ok());
    }

    #[test]
    fn from_rows_rejects_ragged_matrix() {
        let rows = vec![vec![1.0, 0.0], vec![0.0]];
        assert!(WhiteningParams::from_rows(&rows, vec![0.0, 0.0]).is_err());
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let params = WhiteningParams::from_rows(&rows, vec![0.5, 0.5]).unwrap();
        assert_eq!(params.matrix[(0, 1)], 2.0);
        assert_eq!(params.matrix[(1, 0)], 3.0);
    }

    #[test]
    fn estimated_transform_is_symmetric_and_sized() {
        let img = ImageF32::from_fn(96, 96, |x, y| ((x * 5 + y * 3 + x * y) % 37) as f32 / 36.0);
        let stream = InMemoryStream::new().with_image("a", img);
        let mut whitener = CovarianceWhitener::new(
            &stream,
            &HogFeatures,
            CovarianceOptions {
                max_samples: 500,
                ..CovarianceOptions::default()
            },
        );
        let patch = PatchDims::new(1, 1);
        let params = whitener.estimate(patch, 32).unwrap();
        params.validate(32).unwrap();
        let asym = (&params.matrix - params.matrix.transpose()).amax();
        assert!(asym < 1e-3, "asymmetry {asym}");
        // The truncation feature never varies, so only the ridge remains.
        let expected = 1.0 / 0.01f32.sqrt();
        assert!((params.matrix[(31, 31)] - expected).abs() < 0.05 * expected);
    }
}
