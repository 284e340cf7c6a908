//! Execution strategies
//!
//! All strategies run the same pipeline (hash, binarize, counters, trees)
//! and produce bit-identical predictions; they differ only in memory reuse,
//! lookup structures and traversal layout.
//!
//! | Strategy       | Scratch      | One-hot lookup      | Borders | Trees           |
//! |----------------|--------------|---------------------|---------|-----------------|
//! | `scalar`       | per call     | id → slot hash map  | scalar  | per tree        |
//! | `pooled`       | thread-local | id → slot hash map  | scalar  | per tree        |
//! | `direct_hash`  | thread-local | dense slot array    | scalar  | flattened       |
//! | `vectorized`   | thread-local | dense slot array    | 8-lane  | flattened       |
//! | `unrolled`     | thread-local | dense slot array    | 8-lane  | depth-unrolled  |
//!
//! `auto` resolves once per process from runtime CPU capabilities.

pub mod direct_hash;
pub mod pooled;
pub mod scalar;
pub mod unrolled;
pub mod vectorized;

pub use direct_hash::{DirectHashStrategy, OneHotSlots};
pub use pooled::PooledStrategy;
pub use scalar::ScalarStrategy;
pub use unrolled::UnrolledStrategy;
pub use vectorized::VectorizedStrategy;

use crate::binarize::Sample;
use crate::ctr::CounterCalculator;
use crate::errors::ApplyError;
use crate::model::ModelArtifact;
use crate::scratch::{with_thread_scratch, Scratch};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// One way of running the apply pipeline for a model
///
/// Implementations are built for a specific model and hold only derived,
/// read-only lookup state, so one instance serves all threads.
pub trait ApplyStrategy: Send + Sync + fmt::Debug {
    /// Which strategy this is
    fn kind(&self) -> StrategyKind;

    /// Fill `scratch` with the binarized vector of `sample`
    fn binarize(
        &self,
        model: &ModelArtifact,
        counters: &dyn CounterCalculator,
        sample: Sample<'_>,
        scratch: &mut Scratch,
    );

    /// Transformed ensemble output for a binarized vector
    fn evaluate(&self, model: &ModelArtifact, bins: &[u8]) -> f64;

    /// Whether `apply` reuses the calling thread's scratch buffer
    fn uses_thread_scratch(&self) -> bool {
        false
    }

    /// Run the whole pipeline for one sample
    fn apply(
        &self,
        model: &ModelArtifact,
        counters: &dyn CounterCalculator,
        sample: Sample<'_>,
    ) -> f64 {
        let run = |scratch: &mut Scratch| {
            self.binarize(model, counters, sample, scratch);
            self.evaluate(model, scratch.bins())
        };
        if self.uses_thread_scratch() {
            with_thread_scratch(run)
        } else {
            run(&mut Scratch::new())
        }
    }
}

/// Selectable execution strategy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Scalar,
    Pooled,
    DirectHash,
    Vectorized,
    Unrolled,
    #[default]
    Auto,
}

static SIMD_AVAILABLE: Lazy<bool> = Lazy::new(|| {
    let available = detect_simd();
    debug!(available, "detected SIMD capability");
    available
});

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn detect_simd() -> bool {
    is_x86_feature_detected!("avx2") || is_x86_feature_detected!("sse4.1")
}

#[cfg(target_arch = "aarch64")]
fn detect_simd() -> bool {
    std::arch::is_aarch64_feature_detected!("neon")
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
fn detect_simd() -> bool {
    cfg!(target_feature = "simd128")
}

/// Whether the running CPU has usable vector instructions
pub fn simd_available() -> bool {
    *SIMD_AVAILABLE
}

impl StrategyKind {
    /// Every concrete strategy, excluding `Auto`
    pub const CONCRETE: [StrategyKind; 5] = [
        StrategyKind::Scalar,
        StrategyKind::Pooled,
        StrategyKind::DirectHash,
        StrategyKind::Vectorized,
        StrategyKind::Unrolled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Scalar => "scalar",
            StrategyKind::Pooled => "pooled",
            StrategyKind::DirectHash => "direct_hash",
            StrategyKind::Vectorized => "vectorized",
            StrategyKind::Unrolled => "unrolled",
            StrategyKind::Auto => "auto",
        }
    }

    /// Replace `Auto` with the concrete strategy for this CPU
    pub fn resolve(self) -> StrategyKind {
        match self {
            StrategyKind::Auto if simd_available() => StrategyKind::Unrolled,
            StrategyKind::Auto => StrategyKind::DirectHash,
            concrete => concrete,
        }
    }

    /// Build the strategy for `model`
    pub fn build(self, model: &ModelArtifact) -> Box<dyn ApplyStrategy> {
        let kind = self.resolve();
        debug!(requested = %self, resolved = %kind, "building apply strategy");
        match kind {
            StrategyKind::Scalar => Box::new(ScalarStrategy::new(model)),
            StrategyKind::Pooled => Box::new(PooledStrategy::new(model)),
            StrategyKind::DirectHash | StrategyKind::Auto => {
                Box::new(DirectHashStrategy::new(model))
            }
            StrategyKind::Vectorized => Box::new(VectorizedStrategy::new(model)),
            StrategyKind::Unrolled => Box::new(UnrolledStrategy::new(model)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ApplyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "scalar" | "baseline" => Ok(StrategyKind::Scalar),
            "pooled" | "memory" => Ok(StrategyKind::Pooled),
            "direct_hash" | "categorical" => Ok(StrategyKind::DirectHash),
            "vectorized" | "simd" => Ok(StrategyKind::Vectorized),
            "unrolled" | "full" => Ok(StrategyKind::Unrolled),
            "auto" => Ok(StrategyKind::Auto),
            other => Err(ApplyError::UnsupportedStrategy(other.to_string())),
        }
    }
}
