//! Error type shared by every training stage.
use std::path::PathBuf;

/// Reasons a training run can fail.
#[derive(Debug)]
pub enum TrainError {
    /// A scalar parameter is out of range.
    InvalidParameter { name: &'static str, reason: String },
    /// A matrix or vector does not have the size the patch layout requires.
    DimensionMismatch {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Only one of the whitening matrix and mean vector was supplied.
    WhiteningIncomplete { missing: &'static str },
    /// The projected training matrix exceeds the configured bound.
    AllocationTooLarge { bytes: u128, limit: u128 },
    /// The allocator refused the training matrix.
    OutOfMemory { bytes: usize },
    /// The stream resolved to no images.
    EmptyStream,
    /// Wraparound cannot fill the training matrix.
    InsufficientSamples {
        filled: usize,
        target: usize,
        passes: usize,
    },
    /// An image could not be opened or decoded.
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The sparse-coding solver gave up.
    Solver(String),
}

impl std::fmt::Display for TrainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainError::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter `{name}`: {reason}")
            }
            TrainError::DimensionMismatch {
                what,
                expected,
                found,
            } => write!(
                f,
                "{what} has shape {}x{}, expected {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
            TrainError::WhiteningIncomplete { missing } => {
                write!(f, "whitening requires both matrix and mean ({missing} missing)")
            }
            TrainError::AllocationTooLarge { bytes, limit } => write!(
                f,
                "training matrix needs {:.2} GB, limit is {:.2} GB",
                *bytes as f64 / 1e9,
                *limit as f64 / 1e9
            ),
            TrainError::OutOfMemory { bytes } => {
                write!(f, "failed to allocate {bytes} bytes for the training matrix")
            }
            TrainError::EmptyStream => write!(f, "image stream is empty"),
            TrainError::InsufficientSamples {
                filled,
                target,
                passes,
            } => write!(
                f,
                "insufficient distinct samples: {filled} of {target} columns after {passes} pass(es)"
            ),
            TrainError::Image { path, source } => {
                write!(f, "failed to load {}: {source}", path.display())
            }
            TrainError::Io { path, source } => write!(f, "{}: {source}", path.display()),
            TrainError::Json { path, source } => {
                write!(f, "invalid JSON in {}: {source}", path.display())
            }
            TrainError::Solver(msg) => write!(f, "solver failed: {msg}"),
        }
    }
}

impl std::error::Error for TrainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrainError::Image { source, .. } => Some(source),
            TrainError::Io { source, .. } => Some(source),
            TrainError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl TrainError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        TrainError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
