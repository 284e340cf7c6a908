//! Low-latency apply kernel for oblivious gradient-boosted tree ensembles
//!
//! Evaluates a trained model with numeric, one-hot categorical and counter
//! features against a fixed-size sample and returns one prediction.
//!
//! Modules:
//! - `model`: Immutable model artifact and its validation
//! - `hashing`: Category code to trained hash lookup
//! - `binarize`: Border ranking and one-hot matching into bin codes
//! - `ctr`: Counter feature contract and table-driven implementation
//! - `evaluate`: Oblivious tree traversal and accumulation
//! - `strategy`: Interchangeable, bit-identical execution strategies
//! - `scratch`: Per-call and per-thread scratch buffers
//! - `predictor`: Shape-checked prediction entry points
//! - `config`: TOML and environment configuration
//! - `log`: Tracing subscriber setup
//! - `fixtures`: Sample models shared by tests, benches and fuzzing

pub mod binarize;
pub mod config;
pub mod ctr;
pub mod errors;
pub mod evaluate;
pub mod fixtures;
pub mod hashing;
pub mod log;
pub mod model;
pub mod predictor;
pub mod scratch;
pub mod strategy;

pub use binarize::{binarize, float_bin, float_bin_wide, one_hot_bin, Sample};
pub use config::{ApplyConfig, BatchConfig, ConfigManager, LogFormat, LoggingConfig};
pub use ctr::{CounterCalculator, CtrTables};
pub use errors::{ApplyError, Result, PREDICTION_ERROR_SENTINEL};
pub use evaluate::{evaluate, FlatForest};
pub use hashing::{CategoricalHasher, UNKNOWN_CATEGORY_HASH};
pub use model::{
    CategoricalFeature, ModelArtifact, ObliviousSplit, ObliviousTree, OneHotFeature,
};
pub use predictor::{global, install_global, predict_global, Predictor};
pub use scratch::Scratch;
pub use strategy::{ApplyStrategy, StrategyKind};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One-shot prediction with the reference strategy
///
/// Validates `model` on every call; build a [`Predictor`] for repeated use.
pub fn predict(model: &ModelArtifact, features: &[f32]) -> Result<f32> {
    model.validate()?;
    let expected = model.expected_feature_count();
    if features.len() != expected {
        return Err(ApplyError::ShapeMismatch {
            expected,
            actual: features.len(),
        });
    }
    let sample = Sample::split(features, model.numeric_feature_count());
    let strategy = strategy::ScalarStrategy::new(model);
    Ok(strategy.apply(model, &model.counters, sample) as f32)
}
