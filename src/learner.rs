//! Dictionary learning over normalized training matrices.
//!
//! Two strategies implement [`DictionaryStrategy`]:
//! - [`SparseCodingStrategy`]: drives a [`SparseCodingSolver`] in rounds of
//!   [`ROUND_ITERATIONS`], warm-starting each round from the previous state.
//! - [`RandomSampling`]: picks `k` distinct training columns; a fast, weaker
//!   stand-in meant for debugging.
//!
//! Whatever the strategy, [`split_dictionary`] cuts the result at the
//! grayscale/HOG boundary so atom `i` of both halves stays paired.
pub mod online;
pub mod sampling;
pub mod sparse;

pub use self::online::{OnlineDictionaryLearner, OnlineOptions, OnlineState};
pub use self::sampling::{sample_column_indices, RandomSampling};
pub use self::sparse::{
    SolverConfig, SolverState, SparseCodingSolver, SparseCodingStrategy, ROUND_ITERATIONS,
};

use crate::error::TrainError;
use crate::progress::ProgressReporter;
use nalgebra::DMatrix;

/// Produces a `rows × k` dictionary from a `rows × n` training matrix.
pub trait DictionaryStrategy {
    fn name(&self) -> &'static str;

    fn learn(
        &mut self,
        data: &DMatrix<f32>,
        k: usize,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<DMatrix<f32>, TrainError>;
}

/// Split a joint dictionary into its grayscale and HOG halves.
pub fn split_dictionary(
    dictionary: &DMatrix<f32>,
    gray_size: usize,
) -> Result<(DMatrix<f32>, DMatrix<f32>), TrainError> {
    let rows = dictionary.nrows();
    if gray_size == 0 || gray_size >= rows {
        return Err(TrainError::DimensionMismatch {
            what: "joint dictionary",
            expected: (gray_size + 1, dictionary.ncols()),
            found: dictionary.shape(),
        });
    }
    let dgray = dictionary.rows(0, gray_size).into_owned();
    let dhog = dictionary.rows(gray_size, rows - gray_size).into_owned();
    Ok((dgray, dhog))
}
