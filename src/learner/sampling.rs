use super::DictionaryStrategy;
use crate::error::TrainError;
use crate::progress::{ProgressEvent, ProgressReporter};
use nalgebra::DMatrix;
use rand::seq::SliceRandom;
use rand::Rng;

/// Uniformly permute `0..n` and keep the first `k` indices.
pub fn sample_column_indices<R: Rng + ?Sized>(
    n: usize,
    k: usize,
    rng: &mut R,
) -> Result<Vec<usize>, TrainError> {
    if k > n {
        return Err(TrainError::invalid(
            "k",
            format!("cannot sample {k} dictionary columns from {n} samples"),
        ));
    }
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    Ok(indices)
}

/// Dictionary made of randomly chosen training columns.
pub struct RandomSampling<R> {
    rng: R,
}

impl<R: Rng> RandomSampling<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> DictionaryStrategy for RandomSampling<R> {
    fn name(&self) -> &'static str {
        "random-sampling"
    }

    fn learn(
        &mut self,
        data: &DMatrix<f32>,
        k: usize,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<DMatrix<f32>, TrainError> {
        let indices = sample_column_indices(data.ncols(), k, &mut self.rng)?;
        reporter.report(&ProgressEvent::DictionarySampled {
            k,
            from: data.ncols(),
        });
        Ok(data.select_columns(&indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullReporter;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn indices_are_distinct_and_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let idx = sample_column_indices(50, 20, &mut rng).unwrap();
        assert_eq!(idx.len(), 20);
        assert!(idx.iter().all(|&i| i < 50));
        assert_eq!(idx.iter().collect::<HashSet<_>>().len(), 20);
    }

    #[test]
    fn sampled_columns_come_from_input() {
        let data = DMatrix::from_fn(6, 30, |r, c| (c * 100 + r) as f32);
        let mut strategy = RandomSampling::new(StdRng::seed_from_u64(11));
        let dict = strategy.learn(&data, 10, &mut NullReporter).unwrap();
        assert_eq!(dict.shape(), (6, 10));
        let mut seen = HashSet::new();
        for col in dict.column_iter() {
            let src = (col[0] / 100.0) as usize;
            assert_eq!(col, data.column(src));
            assert!(seen.insert(src), "column {src} picked twice");
        }
    }

    #[test]
    fn more_atoms_than_samples_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_column_indices(3, 4, &mut rng).is_err());
    }
}
