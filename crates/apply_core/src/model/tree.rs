//! Oblivious decision tree structures
//!
//! Every level of an oblivious tree tests the same condition for all nodes,
//! so a tree is fully described by its per-level splits and a dense table of
//! `2^depth` leaf values.

use serde::{Deserialize, Serialize};

/// Deepest tree accepted by model validation.
pub const MAX_TREE_DEPTH: usize = 16;

/// One level of an oblivious tree
///
/// The level's bit is set when
/// `(bins[feature_index] ^ xor_mask) >= threshold`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ObliviousSplit {
    /// Index into the binarized feature vector
    pub feature_index: u32,

    /// Bin-code threshold
    pub threshold: u8,

    /// Mask applied to the bin code before comparison
    #[serde(default)]
    pub xor_mask: u8,
}

impl ObliviousSplit {
    /// Create a split without an xor transform
    pub fn new(feature_index: u32, threshold: u8) -> Self {
        Self {
            feature_index,
            threshold,
            xor_mask: 0,
        }
    }

    /// Create a split with an explicit xor mask
    pub fn with_xor(feature_index: u32, threshold: u8, xor_mask: u8) -> Self {
        Self {
            feature_index,
            threshold,
            xor_mask,
        }
    }

    /// Evaluate the split condition against a binarized vector
    #[inline]
    pub fn test(&self, bins: &[u8]) -> bool {
        (bins[self.feature_index as usize] ^ self.xor_mask) >= self.threshold
    }
}

/// A single oblivious tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObliviousTree {
    /// Splits ordered from the least-significant leaf-index bit
    pub splits: Vec<ObliviousSplit>,

    /// Leaf values, `2^depth` entries
    pub leaf_values: Vec<f64>,
}

impl ObliviousTree {
    /// Create a new tree from its splits and leaf values
    pub fn new(splits: Vec<ObliviousSplit>, leaf_values: Vec<f64>) -> Self {
        Self {
            splits,
            leaf_values,
        }
    }

    /// Tree depth (number of split levels)
    pub fn depth(&self) -> usize {
        self.splits.len()
    }

    /// Build the leaf index for a binarized vector
    #[inline]
    pub fn leaf_index(&self, bins: &[u8]) -> usize {
        let mut index = 0usize;
        for (level, split) in self.splits.iter().enumerate() {
            index |= (split.test(bins) as usize) << level;
        }
        index
    }

    /// Leaf value selected by a binarized vector
    #[inline]
    pub fn evaluate(&self, bins: &[u8]) -> f64 {
        self.leaf_values[self.leaf_index(bins)]
    }

    /// Validate tree structure against the binarized vector length
    pub fn validate(&self, binary_feature_count: usize) -> Result<(), String> {
        if self.depth() > MAX_TREE_DEPTH {
            return Err(format!(
                "depth {} exceeds maximum {}",
                self.depth(),
                MAX_TREE_DEPTH
            ));
        }

        let expected_leaves = 1usize << self.depth();
        if self.leaf_values.len() != expected_leaves {
            return Err(format!(
                "expected {} leaf values for depth {}, found {}",
                expected_leaves,
                self.depth(),
                self.leaf_values.len()
            ));
        }

        for (level, split) in self.splits.iter().enumerate() {
            if split.feature_index as usize >= binary_feature_count {
                return Err(format!(
                    "split {} references bin {} but only {} bins exist",
                    level, split.feature_index, binary_feature_count
                ));
            }
        }

        if let Some(i) = self.leaf_values.iter().position(|v| !v.is_finite()) {
            return Err(format!("leaf {i} is not finite"));
        }

        Ok(())
    }
}
