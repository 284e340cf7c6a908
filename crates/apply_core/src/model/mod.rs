//! Model artifact for the apply kernel
//!
//! A [`ModelArtifact`] is the immutable, externally supplied description of a
//! trained ensemble: numeric borders, categorical hash tables, one-hot values,
//! counter tables and borders, oblivious trees, and the output transform.
//! It is validated once, then shared read-only by every prediction.
//!
//! # Binarized layout
//!
//! The binarized feature vector built for each sample has one slot per
//! numeric feature with non-empty borders, then one slot per one-hot feature,
//! then one slot per counter feature:
//!
//! ```text
//! [ numeric bins ... | one-hot bins ... | counter bins ... ]
//! ```

pub mod tree;

pub use tree::{ObliviousSplit, ObliviousTree, MAX_TREE_DEPTH};

use crate::ctr::CtrTables;
use crate::errors::{ApplyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Largest number of borders or one-hot values a single bin code can rank.
pub const MAX_BIN_VALUES: usize = u8::MAX as usize;

/// A categorical feature and its pre-baked category hash table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoricalFeature {
    /// Model feature identifier
    pub id: u32,

    /// Hash per category code, indexed by code
    pub hashes: Vec<i32>,
}

impl CategoricalFeature {
    pub fn new(id: u32, hashes: Vec<i32>) -> Self {
        Self { id, hashes }
    }
}

/// A categorical feature binarized by matching its hash against trained values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OneHotFeature {
    /// Identifier of the categorical feature this reads
    pub feature_id: u32,

    /// Trained hash values; bin code is the 1-based position of the match
    pub hash_values: Vec<i32>,
}

impl OneHotFeature {
    pub fn new(feature_id: u32, hash_values: Vec<i32>) -> Self {
        Self {
            feature_id,
            hash_values,
        }
    }
}

/// Immutable description of a trained oblivious-tree ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelArtifact {
    /// Border list per numeric feature; empty lists mark unused features
    pub float_feature_borders: Vec<Vec<f32>>,

    /// Categorical features in packed order
    #[serde(default)]
    pub categorical_features: Vec<CategoricalFeature>,

    /// One-hot features in declaration order
    #[serde(default)]
    pub one_hot_features: Vec<OneHotFeature>,

    /// Counter statistics
    #[serde(default)]
    pub counters: CtrTables,

    /// Border list per counter feature
    #[serde(default)]
    pub counter_feature_borders: Vec<Vec<f32>>,

    /// Trees in accumulation order
    pub trees: Vec<ObliviousTree>,

    /// Multiplier applied to the summed leaf values
    pub scale: f64,

    /// Offset added after scaling
    pub bias: f64,
}

impl ModelArtifact {
    /// Number of numeric inputs in a sample
    pub fn numeric_feature_count(&self) -> usize {
        self.float_feature_borders.len()
    }

    /// Number of categorical inputs in a sample
    pub fn categorical_feature_count(&self) -> usize {
        self.categorical_features.len()
    }

    /// Total sample length expected by `predict`
    pub fn expected_feature_count(&self) -> usize {
        self.numeric_feature_count() + self.categorical_feature_count()
    }

    /// Numeric features that contribute a bin
    pub fn used_float_feature_count(&self) -> usize {
        self.float_feature_borders
            .iter()
            .filter(|b| !b.is_empty())
            .count()
    }

    /// Length of the numeric + one-hot bin prefix seen by counters
    pub fn counter_input_len(&self) -> usize {
        self.used_float_feature_count() + self.one_hot_features.len()
    }

    /// Number of counter features
    pub fn used_counter_count(&self) -> usize {
        self.counter_feature_borders.len()
    }

    /// Length of the binarized feature vector
    pub fn binary_feature_count(&self) -> usize {
        self.counter_input_len() + self.used_counter_count()
    }

    /// Number of trees in the ensemble
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Packed slot of a categorical feature identifier
    pub fn packed_index(&self, feature_id: u32) -> Option<usize> {
        self.categorical_features
            .iter()
            .position(|f| f.id == feature_id)
    }

    /// Validate every structural invariant the kernel relies on
    ///
    /// Beyond bounds checks this is stricter than the binary layout demands:
    /// a one-hot feature must carry between 1 and 255 hash values. An empty
    /// list is rejected as [`ApplyError::InvalidModel`] rather than accepted
    /// as a bin that is always 0.
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || !self.bias.is_finite() {
            return Err(ApplyError::InvalidModel(format!(
                "scale {} and bias {} must be finite",
                self.scale, self.bias
            )));
        }

        for (i, borders) in self.float_feature_borders.iter().enumerate() {
            validate_borders(borders)
                .map_err(|e| ApplyError::InvalidModel(format!("float feature {i}: {e}")))?;
        }

        let mut seen = HashMap::with_capacity(self.categorical_features.len());
        for (slot, feature) in self.categorical_features.iter().enumerate() {
            if let Some(previous) = seen.insert(feature.id, slot) {
                return Err(ApplyError::InvalidModel(format!(
                    "categorical feature id {} declared at slots {} and {}",
                    feature.id, previous, slot
                )));
            }
        }

        for (i, one_hot) in self.one_hot_features.iter().enumerate() {
            if !seen.contains_key(&one_hot.feature_id) {
                return Err(ApplyError::InvalidModel(format!(
                    "one-hot feature {} references unknown categorical id {}",
                    i, one_hot.feature_id
                )));
            }
            if one_hot.hash_values.is_empty() || one_hot.hash_values.len() > MAX_BIN_VALUES {
                return Err(ApplyError::InvalidModel(format!(
                    "one-hot feature {} has {} hash values, expected 1..={}",
                    i,
                    one_hot.hash_values.len(),
                    MAX_BIN_VALUES
                )));
            }
        }

        let counters = self.counters.used_count();
        if counters != self.used_counter_count() {
            return Err(ApplyError::InvalidModel(format!(
                "{} counter features but {} counter border lists",
                counters,
                self.used_counter_count()
            )));
        }

        for (i, borders) in self.counter_feature_borders.iter().enumerate() {
            validate_borders(borders)
                .map_err(|e| ApplyError::InvalidModel(format!("counter feature {i}: {e}")))?;
        }

        self.counters
            .validate(self.categorical_feature_count(), self.counter_input_len())
            .map_err(|e| ApplyError::InvalidModel(format!("counter tables: {e}")))?;

        let binary_features = self.binary_feature_count();
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(binary_features)
                .map_err(|e| ApplyError::InvalidModel(format!("tree {i}: {e}")))?;
        }

        debug!(
            trees = self.tree_count(),
            binary_features,
            counters,
            "model artifact validated"
        );
        Ok(())
    }
}

fn validate_borders(borders: &[f32]) -> std::result::Result<(), String> {
    if borders.len() > MAX_BIN_VALUES {
        return Err(format!(
            "{} borders exceed the maximum of {}",
            borders.len(),
            MAX_BIN_VALUES
        ));
    }
    if borders.iter().any(|b| b.is_nan()) {
        return Err("border is NaN".to_string());
    }
    if borders.windows(2).any(|w| w[0] > w[1]) {
        return Err("borders are not sorted ascending".to_string());
    }
    Ok(())
}

/// Map from categorical feature identifier to packed slot
///
/// Built once per predictor; the reference strategy resolves one-hot
/// features through it on every call.
#[derive(Debug, Clone, Default)]
pub struct CategoricalIndex {
    packed: HashMap<u32, usize>,
}

impl CategoricalIndex {
    pub fn new(model: &ModelArtifact) -> Self {
        let packed = model
            .categorical_features
            .iter()
            .enumerate()
            .map(|(slot, f)| (f.id, slot))
            .collect();
        Self { packed }
    }

    #[inline]
    pub fn slot(&self, feature_id: u32) -> Option<usize> {
        self.packed.get(&feature_id).copied()
    }

    pub fn len(&self) -> usize {
        self.packed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packed.is_empty()
    }
}
