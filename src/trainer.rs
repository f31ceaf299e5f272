//! End-to-end training of a paired dictionary.
//!
//! [`PairDictTrainer`] runs harvest → normalize → learn → split and
//! assembles the [`PairedDictionary`]. Parameters are validated, and the
//! whitening transform resolved, before any image is read.
use crate::error::TrainError;
use crate::features::{FeatureExtractor, HogFeatures};
use crate::harvest::{harvest, Harvest, HarvestOptions, DEFAULT_MAX_BYTES, DEFAULT_MAX_PASSES};
use crate::layout::{PatchDims, PatchLayout};
use crate::learner::{
    split_dictionary, DictionaryStrategy, OnlineDictionaryLearner, RandomSampling,
    SparseCodingStrategy,
};
use crate::model::PairedDictionary;
use crate::normalize::normalize;
use crate::progress::{LogReporter, ProgressReporter};
use crate::stream::ImageStream;
use crate::whitening::{
    CovarianceOptions, CovarianceWhitener, WhiteningConfig, WhiteningEstimator, WhiteningParams,
};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Sparsity weight used without whitening.
pub const DEFAULT_LAMBDA: f32 = 0.02;
/// Sparsity weight used with whitening; whitened HOG has unit-scale variance.
pub const DEFAULT_WHITENED_LAMBDA: f32 = 0.8;

/// Training parameters.
#[derive(Clone, Debug)]
pub struct TrainParams {
    /// Number of training columns to harvest.
    pub n: usize,
    /// Dictionary size.
    pub k: usize,
    pub patch: PatchDims,
    /// HOG bin size in pixels.
    pub sbin: usize,
    /// Solver iterations in exact mode.
    pub total_iters: usize,
    /// L1 sparsity weight; `None` picks a default from the whitening mode.
    pub lambda: Option<f32>,
    /// Sample training columns instead of learning the dictionary.
    pub fast: bool,
    pub whitening: WhiteningConfig,
    /// Seed for window subsampling and random-sampling dictionaries.
    pub seed: Option<u64>,
    pub max_passes: usize,
    pub max_bytes: u128,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            n: 1_000_000,
            k: 1024,
            patch: PatchDims::default(),
            sbin: 8,
            total_iters: 1000,
            lambda: None,
            fast: false,
            whitening: WhiteningConfig::Disabled,
            seed: None,
            max_passes: DEFAULT_MAX_PASSES,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl TrainParams {
    /// Effective L1 sparsity weight.
    pub fn sparsity_weight(&self) -> f32 {
        self.lambda.unwrap_or(if self.whitening.is_enabled() {
            DEFAULT_WHITENED_LAMBDA
        } else {
            DEFAULT_LAMBDA
        })
    }

    pub fn validate(&self) -> Result<(), TrainError> {
        let positive = [
            ("n", self.n),
            ("k", self.k),
            ("ny", self.patch.ny),
            ("nx", self.patch.nx),
            ("sbin", self.sbin),
            ("max_passes", self.max_passes),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(TrainError::invalid(name, "must be positive"));
            }
        }
        if self.fast && self.k > self.n {
            return Err(TrainError::invalid(
                "k",
                format!("fast mode needs k <= n ({} > {})", self.k, self.n),
            ));
        }
        if !self.fast && self.total_iters == 0 {
            return Err(TrainError::invalid("total_iters", "must be positive"));
        }
        if let Some(lambda) = self.lambda {
            if !lambda.is_finite() || lambda < 0.0 {
                return Err(TrainError::invalid(
                    "lambda",
                    format!("{lambda} is not a finite non-negative weight"),
                ));
            }
        }
        Ok(())
    }
}

/// Orchestrates a training run.
pub struct PairDictTrainer {
    params: TrainParams,
    extractor: Box<dyn FeatureExtractor>,
    solver: OnlineDictionaryLearner,
    estimator: Option<Box<dyn WhiteningEstimator>>,
}

impl PairDictTrainer {
    pub fn new(params: TrainParams) -> Self {
        Self {
            params,
            extractor: Box::new(HogFeatures),
            solver: OnlineDictionaryLearner::default(),
            estimator: None,
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn FeatureExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_solver(mut self, solver: OnlineDictionaryLearner) -> Self {
        self.solver = solver;
        self
    }

    /// Estimator used for [`WhiteningConfig::AutoEstimate`]; by default the
    /// covariance of the training stream's HOG windows.
    pub fn with_whitening_estimator(mut self, estimator: Box<dyn WhiteningEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn params(&self) -> &TrainParams {
        &self.params
    }

    pub fn layout(&self) -> PatchLayout {
        PatchLayout::new(self.params.patch, self.params.sbin, self.extractor.dims())
    }

    /// Train with progress sent to the `log` facade.
    pub fn train<S: ImageStream + ?Sized>(
        &mut self,
        stream: &S,
    ) -> Result<PairedDictionary, TrainError> {
        self.train_with_reporter(stream, &mut LogReporter)
    }

    pub fn train_with_reporter<S: ImageStream + ?Sized>(
        &mut self,
        stream: &S,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<PairedDictionary, TrainError> {
        self.params.validate()?;
        let layout = self.layout();
        let whitening = self.resolve_whitening(stream, &layout)?;
        let lambda = self.params.sparsity_weight();
        let mut rng = match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let options = HarvestOptions::new(self.params.n, self.params.patch, self.params.sbin)
            .with_max_passes(self.params.max_passes)
            .with_max_bytes(self.params.max_bytes);
        let Harvest {
            mut data,
            images,
            passes,
        } = harvest(stream, &*self.extractor, &options, &mut rng, reporter)?;
        info!(
            "harvested {} columns from {} image(s) in {} pass(es)",
            data.ncols(),
            images.len(),
            passes
        );

        normalize(&mut data, &layout, whitening.as_ref(), reporter)?;

        let dictionary = if self.params.fast {
            let mut strategy = RandomSampling::new(&mut rng);
            info!("learning dictionary with {}", strategy.name());
            strategy.learn(&data, self.params.k, reporter)?
        } else {
            let mut strategy =
                SparseCodingStrategy::new(self.solver.clone(), self.params.total_iters, lambda);
            info!("learning dictionary with {}", strategy.name());
            strategy.learn(&data, self.params.k, reporter)?
        };
        drop(data);

        let (dgray, dhog) = split_dictionary(&dictionary, layout.gray_size())?;
        Ok(PairedDictionary {
            dgray,
            dhog,
            n: self.params.n,
            k: self.params.k,
            patch: self.params.patch,
            sbin: self.params.sbin,
            feature: self.extractor.name().to_string(),
            feature_dims: layout.feature_dims,
            iters: self.params.total_iters,
            lambda,
            fast: self.params.fast,
            whitened: whitening.is_some(),
            whitening,
            images,
        })
    }

    fn resolve_whitening<S: ImageStream + ?Sized>(
        &mut self,
        stream: &S,
        layout: &PatchLayout,
    ) -> Result<Option<WhiteningParams>, TrainError> {
        let hog_size = layout.hog_size();
        let params = match &self.params.whitening {
            WhiteningConfig::Disabled => return Ok(None),
            WhiteningConfig::Provided(params) => params.clone(),
            WhiteningConfig::AutoEstimate => match self.estimator.as_mut() {
                Some(estimator) => estimator.estimate(self.params.patch, hog_size)?,
                None => {
                    let options = CovarianceOptions {
                        sbin: self.params.sbin,
                        ..CovarianceOptions::default()
                    };
                    CovarianceWhitener::new(stream, &*self.extractor, options)
                        .estimate(self.params.patch, hog_size)?
                }
            },
        };
        params.validate(hog_size)?;
        Ok(Some(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_policy_table() {
        let params = TrainParams::default();
        assert_eq!(params.n, 1_000_000);
        assert_eq!(params.k, 1024);
        assert_eq!(params.patch, PatchDims::new(5, 5));
        assert_eq!(params.sbin, 8);
        assert_eq!(params.total_iters, 1000);
        assert!(!params.fast);
        assert_eq!(params.sparsity_weight(), DEFAULT_LAMBDA);
    }

    #[test]
    fn whitening_raises_default_lambda() {
        let params = TrainParams {
            whitening: WhiteningConfig::AutoEstimate,
            ..TrainParams::default()
        };
        assert_eq!(params.sparsity_weight(), DEFAULT_WHITENED_LAMBDA);
        let explicit = TrainParams {
            lambda: Some(0.3),
            ..params
        };
        assert_eq!(explicit.sparsity_weight(), 0.3);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let zero_k = TrainParams {
            k: 0,
            ..TrainParams::default()
        };
        assert!(matches!(
            zero_k.validate(),
            Err(TrainError::InvalidParameter { name: "k", .. })
        ));
        let fast_too_many = TrainParams {
            n: 5,
            k: 6,
            fast: true,
            ..TrainParams::default()
        };
        assert!(fast_too_many.validate().is_err());
        let negative_lambda = TrainParams {
            lambda: Some(-1.0),
            ..TrainParams::default()
        };
        assert!(negative_lambda.validate().is_err());
    }
}
