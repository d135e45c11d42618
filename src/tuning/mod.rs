//! Hyperparameter tuning
//!
//! Random search over per-family grids, scored by cross-validated MSE.

pub mod samplers;
pub mod search_space;
pub mod tuner;

pub use samplers::{RandomSampler, Sampler};
pub use search_space::{Parameter, ParameterValue, SearchSpace, TrialParams};
pub use tuner::{
    build_regressor, default_search_space, RandomSearchTuner, TrialResult, TuneOutcome,
    TunerConfig,
};
