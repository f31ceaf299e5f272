//! Online dictionary learning with an L1 sparsity penalty.
//!
//! Each iteration draws a mini-batch of training columns, computes their
//! sparse codes against the current dictionary by coordinate-descent lasso
//!
//! ```text
//! min_a 0.5 ||x - D a||^2 + lambda ||a||_1
//! ```
//!
//! and folds them into the sufficient statistics `A = Σ a aᵀ`, `B = Σ x aᵀ`.
//! Atoms are then updated one at a time by block-coordinate descent and
//! projected onto the unit ball.
//!
//! Codes of a mini-batch are computed in parallel on a dedicated rayon pool;
//! statistics are accumulated sequentially, so results depend only on the
//! seed.
use super::sparse::{SolverConfig, SolverState, SparseCodingSolver};
use crate::error::TrainError;
use log::debug;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

const ATOM_EPS: f32 = 1e-10;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OnlineOptions {
    /// Columns drawn per iteration.
    pub batch_size: usize,
    /// Worker threads for sparse coding; `0` lets rayon decide.
    pub threads: usize,
    /// Maximum coordinate-descent sweeps per code.
    pub lasso_sweeps: usize,
    /// Sweeps stop once no coefficient moves more than this.
    pub lasso_tol: f32,
    /// Seed of the mini-batch sampler; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for OnlineOptions {
    fn default() -> Self {
        Self {
            batch_size: 256,
            threads: 0,
            lasso_sweeps: 50,
            lasso_tol: 1e-4,
            seed: None,
        }
    }
}

/// Dictionary plus the statistics needed to resume learning.
#[derive(Clone, Debug)]
pub struct OnlineState {
    pub dictionary: DMatrix<f32>,
    /// `k × k` accumulated code outer products.
    pub a: DMatrix<f32>,
    /// `rows × k` accumulated data/code products.
    pub b: DMatrix<f32>,
    pub iterations: usize,
    rng: StdRng,
}

impl SolverState for OnlineState {
    fn dictionary(&self) -> &DMatrix<f32> {
        &self.dictionary
    }

    fn into_dictionary(self) -> DMatrix<f32> {
        self.dictionary
    }

    fn iterations(&self) -> usize {
        self.iterations
    }
}

#[derive(Clone, Debug, Default)]
pub struct OnlineDictionaryLearner {
    options: OnlineOptions,
}

impl OnlineDictionaryLearner {
    pub fn new(options: OnlineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &OnlineOptions {
        &self.options
    }

    fn initial_state(&self, data: &DMatrix<f32>, k: usize) -> OnlineState {
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (rows, n) = data.shape();
        let picks: Vec<usize> = if k <= n {
            index::sample(&mut rng, n, k).into_vec()
        } else {
            (0..k).map(|_| rng.gen_range(0..n)).collect()
        };
        let mut dictionary = data.select_columns(&picks);
        for mut atom in dictionary.column_iter_mut() {
            // Repeated picks and flat columns get a random direction mixed in.
            for v in atom.iter_mut() {
                *v += rng.gen_range(-1e-3..1e-3);
            }
            let norm = atom.norm();
            if norm > ATOM_EPS {
                atom /= norm;
            }
        }
        OnlineState {
            dictionary,
            a: DMatrix::zeros(k, k),
            b: DMatrix::zeros(rows, k),
            iterations: 0,
            rng,
        }
    }

    fn step(
        &self,
        data: &DMatrix<f32>,
        state: &mut OnlineState,
        lambda: f32,
        pool: &rayon::ThreadPool,
    ) {
        let n = data.ncols();
        let batch: Vec<usize> = (0..self.options.batch_size.max(1))
            .map(|_| state.rng.gen_range(0..n))
            .collect();

        let dictionary = &state.dictionary;
        let gram = dictionary.tr_mul(dictionary);
        let (sweeps, tol) = (self.options.lasso_sweeps, self.options.lasso_tol);
        let codes: Vec<Vec<(usize, f32)>> = pool.install(|| {
            batch
                .par_iter()
                .map(|&c| {
                    let corr = dictionary.tr_mul(&data.column(c));
                    lasso_cd(&gram, &corr, lambda, sweeps, tol)
                })
                .collect()
        });

        for (&c, code) in batch.iter().zip(&codes) {
            let x = data.column(c);
            for &(i, ai) in code {
                for &(j, aj) in code {
                    state.a[(i, j)] += ai * aj;
                }
                state.b.column_mut(i).axpy(ai, &x, 1.0);
            }
        }

        update_atoms(&mut state.dictionary, &state.a, &state.b);
        state.iterations += 1;
    }
}

impl SparseCodingSolver for OnlineDictionaryLearner {
    type State = OnlineState;

    fn fit(
        &self,
        data: &DMatrix<f32>,
        config: &SolverConfig,
        warm_start: Option<OnlineState>,
    ) -> Result<OnlineState, TrainError> {
        let (rows, n) = data.shape();
        if rows == 0 || n == 0 {
            return Err(TrainError::invalid("data", "training matrix is empty"));
        }
        if config.k == 0 {
            return Err(TrainError::invalid("k", "must be positive"));
        }
        if !(config.lambda >= 0.0) {
            return Err(TrainError::invalid("lambda", "must be non-negative"));
        }

        let mut state = match warm_start {
            Some(state) => {
                if state.dictionary.shape() != (rows, config.k) {
                    return Err(TrainError::DimensionMismatch {
                        what: "warm-start dictionary",
                        expected: (rows, config.k),
                        found: state.dictionary.shape(),
                    });
                }
                state
            }
            None => self.initial_state(data, config.k),
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .build()
            .map_err(|e| TrainError::Solver(e.to_string()))?;

        for _ in 0..config.iterations {
            self.step(data, &mut state, config.lambda, &pool);
        }
        debug!(
            "online solver: {} iterations, k={}, lambda={}",
            state.iterations, config.k, config.lambda
        );
        Ok(state)
    }
}

/// Coordinate-descent lasso given `G = DᵀD` and `c = Dᵀx`; returns the
/// non-zero coefficients.
fn lasso_cd(
    gram: &DMatrix<f32>,
    corr: &DVector<f32>,
    lambda: f32,
    sweeps: usize,
    tol: f32,
) -> Vec<(usize, f32)> {
    let k = corr.len();
    let mut alpha = vec![0.0f32; k];
    // r = c - G alpha
    let mut residual = corr.clone();
    for _ in 0..sweeps {
        let mut max_delta = 0.0f32;
        for j in 0..k {
            let gjj = gram[(j, j)];
            if gjj <= ATOM_EPS {
                continue;
            }
            let rho = residual[j] + gjj * alpha[j];
            let next = soft_threshold(rho, lambda) / gjj;
            let delta = next - alpha[j];
            if delta != 0.0 {
                residual.axpy(-delta, &gram.column(j), 1.0);
                alpha[j] = next;
                max_delta = max_delta.max(delta.abs());
            }
        }
        if max_delta < tol {
            break;
        }
    }
    alpha
        .into_iter()
        .enumerate()
        .filter(|&(_, a)| a != 0.0)
        .collect()
}

#[inline]
fn soft_threshold(v: f32, lambda: f32) -> f32 {
    if v > lambda {
        v - lambda
    } else if v < -lambda {
        v + lambda
    } else {
        0.0
    }
}

/// One block-coordinate pass over the atoms.
fn update_atoms(dictionary: &mut DMatrix<f32>, a: &DMatrix<f32>, b: &DMatrix<f32>) {
    for j in 0..dictionary.ncols() {
        let ajj = a[(j, j)];
        if ajj <= ATOM_EPS {
            continue;
        }
        let mut u = &*dictionary * a.column(j);
        u -= b.column(j);
        u /= -ajj;
        u += dictionary.column(j);
        let norm = u.norm();
        if norm > 1.0 {
            u /= norm;
        }
        dictionary.set_column(j, &u);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_data(rows: usize, cols: usize) -> DMatrix<f32> {
        // Columns are sparse combinations of a few fixed directions.
        let atoms = DMatrix::from_fn(rows, 4, |r, c| ((r * (c + 2)) % 7) as f32 - 3.0);
        DMatrix::from_fn(rows, cols, |r, c| {
            let a = c % 4;
            let b = (c / 4) % 4;
            atoms[(r, a)] + 0.5 * atoms[(r, b)]
        })
    }

    fn learner(seed: u64) -> OnlineDictionaryLearner {
        OnlineDictionaryLearner::new(OnlineOptions {
            batch_size: 16,
            threads: 2,
            seed: Some(seed),
            ..OnlineOptions::default()
        })
    }

    #[test]
    fn lasso_recovers_single_atom_with_shrinkage() {
        let gram = DMatrix::<f32>::identity(3, 3);
        let corr = DVector::from_vec(vec![2.0, 0.05, -1.0]);
        let code = lasso_cd(&gram, &corr, 0.1, 10, 1e-6);
        assert_eq!(code.len(), 2);
        assert_eq!(code[0].0, 0);
        assert!((code[0].1 - 1.9).abs() < 1e-6);
        assert_eq!(code[1].0, 2);
        assert!((code[1].1 + 0.9).abs() < 1e-6);
    }

    #[test]
    fn atoms_stay_in_unit_ball() {
        let data = synthetic_data(12, 64);
        let config = SolverConfig {
            lambda: 0.1,
            k: 6,
            iterations: 20,
        };
        let state = learner(3).fit(&data, &config, None).unwrap();
        assert_eq!(state.dictionary.shape(), (12, 6));
        assert_eq!(state.iterations, 20);
        for atom in state.dictionary.column_iter() {
            assert!(atom.norm() <= 1.0 + 1e-4);
        }
    }

    #[test]
    fn warm_started_rounds_match_single_run() {
        let data = synthetic_data(10, 40);
        let solver = learner(9);
        let single = solver
            .fit(
                &data,
                &SolverConfig {
                    lambda: 0.05,
                    k: 5,
                    iterations: 30,
                },
                None,
            )
            .unwrap();

        let mut state = None;
        for iterations in [10, 10, 10] {
            let config = SolverConfig {
                lambda: 0.05,
                k: 5,
                iterations,
            };
            state = Some(solver.fit(&data, &config, state.take()).unwrap());
        }
        let chunked = state.unwrap();
        assert_eq!(chunked.iterations, 30);
        assert!((&chunked.dictionary - &single.dictionary).amax() < 1e-6);
    }

    #[test]
    fn warm_start_with_wrong_shape_is_rejected() {
        let data = synthetic_data(8, 20);
        let solver = learner(1);
        let config = SolverConfig {
            lambda: 0.1,
            k: 3,
            iterations: 1,
        };
        let state = solver.fit(&data, &config, None).unwrap();
        let bigger = SolverConfig { k: 4, ..config };
        assert!(matches!(
            solver.fit(&data, &bigger, Some(state)),
            Err(TrainError::DimensionMismatch { .. })
        ));
    }
}
