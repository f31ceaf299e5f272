#![doc = include_str!("../README.md")]

// Pipeline stages
pub mod harvest;
pub mod learner;
pub mod normalize;
pub mod trainer;

// Data and collaborators
pub mod error;
pub mod features;
pub mod image;
pub mod layout;
pub mod model;
pub mod progress;
pub mod stream;
pub mod whitening;

// Tool configuration
pub mod config;

// --- High-level re-exports -------------------------------------------------

pub use crate::error::TrainError;
pub use crate::layout::{PatchDims, PatchLayout};
pub use crate::model::PairedDictionary;
pub use crate::trainer::{PairDictTrainer, TrainParams};
pub use crate::whitening::{WhiteningConfig, WhiteningParams};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use hog_pairdict::prelude::*;
///
/// # fn main() -> Result<(), TrainError> {
/// let stream = FileStream::from_spec(&StreamSpec::Directory("images".into()))?;
/// let mut trainer = PairDictTrainer::new(TrainParams {
///     n: 100_000,
///     k: 256,
///     fast: true,
///     ..Default::default()
/// });
/// let model = trainer.train(&stream)?;
/// println!("dgray={:?} dhog={:?}", model.dgray.shape(), model.dhog.shape());
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::stream::{FileStream, ImageStream, InMemoryStream, StreamSpec};
    pub use crate::{
        PairDictTrainer, PairedDictionary, PatchDims, TrainError, TrainParams, WhiteningConfig,
    };
}
