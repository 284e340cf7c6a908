//! Tree ensemble evaluation
//!
//! Leaf values are summed in `f64` in tree order starting from `0.0`, and
//! the output transform is `scale * sum + bias`. Every traversal in this
//! module uses that exact order, so they agree bit for bit.

use crate::model::{ModelArtifact, ObliviousTree};

/// Apply the model's output transform to a raw leaf sum
#[inline]
pub fn finish(model: &ModelArtifact, sum: f64) -> f64 {
    model.scale * sum + model.bias
}

/// Reference evaluation over the model's trees
pub fn evaluate(model: &ModelArtifact, bins: &[u8]) -> f64 {
    let mut sum = 0.0f64;
    for tree in &model.trees {
        sum += tree.evaluate(bins);
    }
    finish(model, sum)
}

/// Structure-of-arrays copy of a forest
///
/// Splits of all trees are stored back to back; leaves likewise, so a
/// traversal only advances two offsets per tree.
#[derive(Debug, Clone, Default)]
pub struct FlatForest {
    depths: Vec<u8>,
    split_features: Vec<u32>,
    thresholds: Vec<u8>,
    xor_masks: Vec<u8>,
    leaf_values: Vec<f64>,
}

impl FlatForest {
    pub fn new(trees: &[ObliviousTree]) -> Self {
        let splits: usize = trees.iter().map(|t| t.depth()).sum();
        let leaves: usize = trees.iter().map(|t| t.leaf_values.len()).sum();

        let mut forest = Self {
            depths: Vec::with_capacity(trees.len()),
            split_features: Vec::with_capacity(splits),
            thresholds: Vec::with_capacity(splits),
            xor_masks: Vec::with_capacity(splits),
            leaf_values: Vec::with_capacity(leaves),
        };

        for tree in trees {
            forest.depths.push(tree.depth() as u8);
            for split in &tree.splits {
                forest.split_features.push(split.feature_index);
                forest.thresholds.push(split.threshold);
                forest.xor_masks.push(split.xor_mask);
            }
            forest.leaf_values.extend_from_slice(&tree.leaf_values);
        }

        forest
    }

    pub fn tree_count(&self) -> usize {
        self.depths.len()
    }

    #[inline]
    fn level_bit(&self, split: usize, bins: &[u8]) -> usize {
        let bin = bins[self.split_features[split] as usize] ^ self.xor_masks[split];
        (bin >= self.thresholds[split]) as usize
    }

    #[inline]
    fn leaf_index(&self, first_split: usize, depth: usize, bins: &[u8]) -> usize {
        let mut index = 0usize;
        for level in 0..depth {
            index |= self.level_bit(first_split + level, bins) << level;
        }
        index
    }

    #[inline]
    fn leaf_index_fixed<const D: usize>(&self, first_split: usize, bins: &[u8]) -> usize {
        let mut index = 0usize;
        for level in 0..D {
            index |= self.level_bit(first_split + level, bins) << level;
        }
        index
    }

    /// Sum of the selected leaves
    pub fn sum_leaves(&self, bins: &[u8]) -> f64 {
        let mut sum = 0.0f64;
        let mut split = 0usize;
        let mut leaf = 0usize;

        for &depth in &self.depths {
            let depth = depth as usize;
            sum += self.leaf_values[leaf + self.leaf_index(split, depth, bins)];
            split += depth;
            leaf += 1 << depth;
        }

        sum
    }

    /// [`FlatForest::sum_leaves`] with fixed-depth traversals for common depths
    pub fn sum_leaves_unrolled(&self, bins: &[u8]) -> f64 {
        let mut sum = 0.0f64;
        let mut split = 0usize;
        let mut leaf = 0usize;

        for &depth in &self.depths {
            let depth = depth as usize;
            let index = match depth {
                4 => self.leaf_index_fixed::<4>(split, bins),
                5 => self.leaf_index_fixed::<5>(split, bins),
                6 => self.leaf_index_fixed::<6>(split, bins),
                8 => self.leaf_index_fixed::<8>(split, bins),
                _ => self.leaf_index(split, depth, bins),
            };
            sum += self.leaf_values[leaf + index];
            split += depth;
            leaf += 1 << depth;
        }

        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_worked_example() {
        let model = fixtures::depth_two_model(1.0, 0.0);
        assert_eq!(evaluate(&model, &[1, 0]), 20.0);
    }

    #[test]
    fn test_scale_and_bias() {
        let model = fixtures::depth_two_model(0.5, 3.0);
        assert_eq!(evaluate(&model, &[1, 0]), 13.0);
    }

    #[test]
    fn test_empty_forest_returns_bias() {
        let mut model = fixtures::depth_two_model(2.0, 1.25);
        model.trees.clear();
        assert_eq!(evaluate(&model, &[0, 0]), 1.25);
        assert_eq!(FlatForest::new(&model.trees).sum_leaves(&[0, 0]), 0.0);
    }

    #[test]
    fn test_flat_forest_is_bit_identical() {
        let model = fixtures::diamonds_model();
        let forest = FlatForest::new(&model.trees);
        assert_eq!(forest.tree_count(), model.tree_count());

        for row in fixtures::sample_rows(64, 11) {
            let bins = crate::binarize::binarize(&model, &model.counters, &row);
            let reference = evaluate(&model, &bins);
            let flat = finish(&model, forest.sum_leaves(&bins));
            let unrolled = finish(&model, forest.sum_leaves_unrolled(&bins));
            assert_eq!(reference.to_bits(), flat.to_bits());
            assert_eq!(reference.to_bits(), unrolled.to_bits());
        }
    }
}
