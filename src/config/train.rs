use crate::harvest::DEFAULT_MAX_BYTES;
use crate::image::io::read_json_file;
use crate::layout::PatchDims;
use crate::learner::OnlineOptions;
use crate::stream::StreamSpec;
use crate::trainer::TrainParams;
use crate::whitening::{matrix_from_rows, WhiteningConfig, WhiteningParams};
use nalgebra::DVector;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct TrainToolConfig {
    pub input: StreamSpec,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub whitening: WhiteningModeConfig,
    #[serde(default)]
    pub solver: SolverConfigFile,
    pub output: TrainOutputConfig,
}

/// Overrides for [`TrainParams`]; unset fields keep the defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct TrainingConfig {
    pub n: Option<usize>,
    pub k: Option<usize>,
    pub ny: Option<usize>,
    pub nx: Option<usize>,
    pub sbin: Option<usize>,
    pub iters: Option<usize>,
    pub lambda: Option<f32>,
    pub fast: Option<bool>,
    pub seed: Option<u64>,
    pub max_passes: Option<usize>,
    /// Bound on the training matrix size in GiB.
    pub max_gib: Option<f64>,
}

impl TrainingConfig {
    pub fn resolve(&self, whitening: WhiteningConfig) -> TrainParams {
        let defaults = TrainParams::default();
        let max_bytes = self
            .max_gib
            .map(|gib| (gib.max(0.0) * (1u64 << 30) as f64) as u128)
            .unwrap_or(DEFAULT_MAX_BYTES);
        TrainParams {
            n: self.n.unwrap_or(defaults.n),
            k: self.k.unwrap_or(defaults.k),
            patch: PatchDims::new(
                self.ny.unwrap_or(defaults.patch.ny),
                self.nx.unwrap_or(defaults.patch.nx),
            ),
            sbin: self.sbin.unwrap_or(defaults.sbin),
            total_iters: self.iters.unwrap_or(defaults.total_iters),
            lambda: self.lambda,
            fast: self.fast.unwrap_or(defaults.fast),
            whitening,
            seed: self.seed,
            max_passes: self.max_passes.unwrap_or(defaults.max_passes),
            max_bytes,
        }
    }
}

/// `"disabled"`, `"auto"`, or `{"provided": {"path": ...}}`.
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum WhiteningModeConfig {
    #[default]
    Disabled,
    Auto,
    Provided(WhiteningFileConfig),
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct WhiteningFileConfig {
    pub path: PathBuf,
}

/// On-disk whitening parameters: a row-major matrix and a mean vector.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WhiteningFile {
    matrix: Option<Vec<Vec<f32>>>,
    mean: Option<Vec<f32>>,
}

impl WhiteningModeConfig {
    pub fn resolve(&self) -> Result<WhiteningConfig, String> {
        match self {
            WhiteningModeConfig::Disabled => Ok(WhiteningConfig::Disabled),
            WhiteningModeConfig::Auto => Ok(WhiteningConfig::AutoEstimate),
            WhiteningModeConfig::Provided(file) => {
                let params = load_whitening_file(&file.path)?;
                Ok(WhiteningConfig::Provided(params))
            }
        }
    }
}

fn load_whitening_file(path: &Path) -> Result<WhiteningParams, String> {
    let file: WhiteningFile = read_json_file(path).map_err(|e| e.to_string())?;
    let matrix = file
        .matrix
        .map(|rows| matrix_from_rows(&rows))
        .transpose()
        .map_err(|e| format!("{}: {e}", path.display()))?;
    let mean = file.mean.map(DVector::from_vec);
    WhiteningParams::from_parts(matrix, mean)
        .map_err(|e| format!("{}: {e}", path.display()))?
        .ok_or_else(|| format!("{}: no whitening matrix or mean", path.display()))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SolverConfigFile {
    pub batch_size: Option<usize>,
    pub threads: Option<usize>,
    pub lasso_sweeps: Option<usize>,
    pub lasso_tol: Option<f32>,
    pub seed: Option<u64>,
}

impl SolverConfigFile {
    pub fn resolve(&self) -> OnlineOptions {
        let mut options = OnlineOptions::default();
        if let Some(v) = self.batch_size {
            options.batch_size = v;
        }
        if let Some(v) = self.threads {
            options.threads = v;
        }
        if let Some(v) = self.lasso_sweeps {
            options.lasso_sweeps = v;
        }
        if let Some(v) = self.lasso_tol {
            options.lasso_tol = v;
        }
        options.seed = self.seed;
        options
    }
}

#[derive(Debug, Deserialize)]
pub struct TrainOutputConfig {
    pub model_json: PathBuf,
}

pub fn load_config(path: &Path) -> Result<TrainToolConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let json = r#"{
            "input": {"directory": "images"},
            "output": {"model_json": "out/model.json"}
        }"#;
        let cfg: TrainToolConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.whitening, WhiteningModeConfig::Disabled);
        let params = cfg.training.resolve(WhiteningConfig::Disabled);
        assert_eq!(params.n, 1_000_000);
        assert_eq!(params.k, 1024);
        assert_eq!(params.max_bytes, DEFAULT_MAX_BYTES);
        assert_eq!(cfg.solver.resolve(), OnlineOptions::default());
    }

    #[test]
    fn overrides_and_modes_parse() {
        let json = r#"{
            "input": {"paths": ["a.png", "b.png"]},
            "training": {"n": 5000, "k": 64, "ny": 3, "nx": 4, "fast": true, "max_gib": 1.0},
            "whitening": "auto",
            "solver": {"threads": 4, "seed": 9},
            "output": {"model_json": "m.json"}
        }"#;
        let cfg: TrainToolConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.whitening, WhiteningModeConfig::Auto);
        let params = cfg.training.resolve(cfg.whitening.resolve().unwrap());
        assert_eq!(params.patch, PatchDims::new(3, 4));
        assert!(params.fast);
        assert_eq!(params.max_bytes, 1 << 30);
        assert_eq!(params.whitening, WhiteningConfig::AutoEstimate);
        let solver = cfg.solver.resolve();
        assert_eq!((solver.threads, solver.seed), (4, Some(9)));
    }

    #[test]
    fn provided_whitening_needs_both_parts() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("hog_pairdict_whiten_{}.json", std::process::id()));
        fs::write(&path, r#"{"matrix": [[1.0, 0.0], [0.0, 1.0]]}"#).unwrap();
        let mode = WhiteningModeConfig::Provided(WhiteningFileConfig { path: path.clone() });
        let err = mode.resolve().unwrap_err();
        assert!(err.contains("mean"), "{err}");

        fs::write(&path, r#"{"matrix": [[1.0, 0.0], [0.0, 1.0]], "mean": [0.5, 0.5]}"#).unwrap();
        match mode.resolve().unwrap() {
            WhiteningConfig::Provided(params) => {
                assert_eq!(params.matrix.shape(), (2, 2));
                assert_eq!(params.mean.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        fs::remove_file(&path).unwrap();
    }
}
