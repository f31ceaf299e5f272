use super::DictionaryStrategy;
use crate::error::TrainError;
use crate::progress::{ProgressEvent, ProgressReporter};
use log::debug;
use nalgebra::DMatrix;

/// Solver iterations per round.
pub const ROUND_ITERATIONS: usize = 100;

/// Hyperparameters of one solver call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverConfig {
    /// L1 penalty on the sparse codes.
    pub lambda: f32,
    /// Number of atoms.
    pub k: usize,
    /// Iterations to run in this call.
    pub iterations: usize,
}

/// State a solver hands back and accepts as a warm start.
pub trait SolverState {
    fn dictionary(&self) -> &DMatrix<f32>;
    fn into_dictionary(self) -> DMatrix<f32>;
    /// Iterations run since the state was created.
    fn iterations(&self) -> usize;
}

/// Sparse-coding dictionary learner.
///
/// Running `fit` for `a` iterations and then again for `b` iterations from
/// the returned state must match a single `a + b` iteration run.
pub trait SparseCodingSolver {
    type State: SolverState;

    fn fit(
        &self,
        data: &DMatrix<f32>,
        config: &SolverConfig,
        warm_start: Option<Self::State>,
    ) -> Result<Self::State, TrainError>;
}

/// Exact strategy: runs the solver for `total_iters` iterations in rounds.
pub struct SparseCodingStrategy<S> {
    solver: S,
    total_iters: usize,
    lambda: f32,
    round_iters: usize,
}

impl<S: SparseCodingSolver> SparseCodingStrategy<S> {
    pub fn new(solver: S, total_iters: usize, lambda: f32) -> Self {
        Self {
            solver,
            total_iters,
            lambda,
            round_iters: ROUND_ITERATIONS,
        }
    }

    pub fn with_round_iters(mut self, round_iters: usize) -> Self {
        self.round_iters = round_iters;
        self
    }
}

impl<S: SparseCodingSolver> DictionaryStrategy for SparseCodingStrategy<S> {
    fn name(&self) -> &'static str {
        "sparse-coding"
    }

    fn learn(
        &mut self,
        data: &DMatrix<f32>,
        k: usize,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<DMatrix<f32>, TrainError> {
        if self.total_iters == 0 {
            return Err(TrainError::invalid("total_iters", "must be positive"));
        }
        if self.round_iters == 0 {
            return Err(TrainError::invalid("round_iters", "must be positive"));
        }
        if k == 0 {
            return Err(TrainError::invalid("k", "must be positive"));
        }

        let mut state: Option<S::State> = None;
        let mut done = 0usize;
        while done < self.total_iters {
            let iterations = self.round_iters.min(self.total_iters - done);
            let config = SolverConfig {
                lambda: self.lambda,
                k,
                iterations,
            };
            let next = self.solver.fit(data, &config, state.take())?;
            done += iterations;
            debug!(
                "solver round done: {} iterations total, state reports {}",
                done,
                next.iterations()
            );
            state = Some(next);
            reporter.report(&ProgressEvent::LearnRound {
                completed: done,
                total: self.total_iters,
            });
        }
        state
            .map(SolverState::into_dictionary)
            .ok_or_else(|| TrainError::Solver("no solver round was run".to_string()))
    }
}
