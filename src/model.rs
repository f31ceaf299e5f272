//! Trained paired dictionary.
use crate::error::TrainError;
use crate::image::io::{read_json_file, write_json_file};
use crate::layout::PatchDims;
use crate::whitening::WhiteningParams;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Grayscale and HOG dictionaries whose columns are paired atoms, together
/// with the settings that produced them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedDictionary {
    /// `gray_size × k`
    pub dgray: DMatrix<f32>,
    /// `hog_size × k`
    pub dhog: DMatrix<f32>,
    /// Requested number of training columns.
    pub n: usize,
    pub k: usize,
    pub patch: PatchDims,
    pub sbin: usize,
    /// Feature extractor identifier.
    pub feature: String,
    pub feature_dims: usize,
    /// Solver iteration budget (unused in fast mode).
    pub iters: usize,
    /// L1 sparsity weight.
    pub lambda: f32,
    pub fast: bool,
    pub whitened: bool,
    /// Present exactly when `whitened` is set.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub whitening: Option<WhiteningParams>,
    /// Images visited while harvesting, in stream order.
    pub images: Vec<String>,
}

impl PairedDictionary {
    pub fn gray_size(&self) -> usize {
        self.dgray.nrows()
    }

    pub fn hog_size(&self) -> usize {
        self.dhog.nrows()
    }

    /// Check the structural invariants of a model (e.g. after loading).
    pub fn validate(&self) -> Result<(), TrainError> {
        if self.dgray.ncols() != self.k || self.dhog.ncols() != self.k {
            return Err(TrainError::DimensionMismatch {
                what: "paired dictionary",
                expected: (self.k, self.k),
                found: (self.dgray.ncols(), self.dhog.ncols()),
            });
        }
        let gray = (self.patch.ny + 2) * (self.patch.nx + 2) * self.sbin * self.sbin;
        if self.gray_size() != gray {
            return Err(TrainError::DimensionMismatch {
                what: "grayscale dictionary",
                expected: (gray, self.k),
                found: self.dgray.shape(),
            });
        }
        let hog = self.patch.ny * self.patch.nx * self.feature_dims;
        if self.hog_size() != hog {
            return Err(TrainError::DimensionMismatch {
                what: "HOG dictionary",
                expected: (hog, self.k),
                found: self.dhog.shape(),
            });
        }
        match (&self.whitening, self.whitened) {
            (Some(params), true) => params.validate(hog),
            (None, false) => Ok(()),
            (None, true) => Err(TrainError::WhiteningIncomplete {
                missing: "matrix and mean",
            }),
            (Some(_), false) => Err(TrainError::invalid(
                "whitening",
                "parameters present on an unwhitened model",
            )),
        }
    }

    pub fn save_json(&self, path: &Path) -> Result<(), TrainError> {
        write_json_file(path, self)
    }

    pub fn load_json(path: &Path) -> Result<Self, TrainError> {
        let model: Self = read_json_file(path)?;
        model.validate()?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    fn model(whitened: bool) -> PairedDictionary {
        let patch = PatchDims::new(1, 1);
        let hog = 2;
        PairedDictionary {
            dgray: DMatrix::from_fn(9, 3, |r, c| (r + c) as f32),
            dhog: DMatrix::from_fn(hog, 3, |r, c| (r * c) as f32),
            n: 10,
            k: 3,
            patch,
            sbin: 1,
            feature: "test".to_string(),
            feature_dims: 2,
            iters: 0,
            lambda: 0.02,
            fast: true,
            whitened,
            whitening: whitened
                .then(|| WhiteningParams::new(DMatrix::identity(hog, hog), DVector::zeros(hog))),
            images: vec!["a.png".to_string()],
        }
    }

    #[test]
    fn json_round_trip_preserves_model() {
        let path = std::env::temp_dir().join(format!(
            "hog_pairdict_model_{}.json",
            std::process::id()
        ));
        let m = model(true);
        m.save_json(&path).unwrap();
        let loaded = PairedDictionary::load_json(&path).unwrap();
        assert_eq!(loaded, m);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unwhitened_model_omits_whitening_field() {
        let json = serde_json::to_string(&model(false)).unwrap();
        assert!(!json.contains("\"whitening\""));
        assert!(json.contains("\"whitened\":false"));
    }

    #[test]
    fn whitened_flag_requires_params() {
        let mut m = model(true);
        m.whitening = None;
        assert!(m.validate().is_err());
        assert!(model(false).validate().is_ok());
    }
}
