//! Map-free strategy
//!
//! One-hot features are resolved to packed categorical slots once, at build
//! time, into a dense array; trees are flattened into one contiguous layout.

use super::{ApplyStrategy, StrategyKind};
use crate::binarize::{binarize_into, float_bin, BorderRank, Sample};
use crate::ctr::CounterCalculator;
use crate::evaluate::{finish, FlatForest};
use crate::model::ModelArtifact;
use crate::scratch::Scratch;

/// Packed categorical slot of every one-hot feature, in declaration order
#[derive(Debug, Clone, Default)]
pub struct OneHotSlots(Vec<usize>);

impl OneHotSlots {
    const MISSING: usize = usize::MAX;

    pub fn new(model: &ModelArtifact) -> Self {
        let slots = model
            .one_hot_features
            .iter()
            .map(|f| model.packed_index(f.feature_id).unwrap_or(Self::MISSING))
            .collect();
        Self(slots)
    }

    #[inline]
    pub fn get(&self, one_hot: usize) -> Option<usize> {
        self.0
            .get(one_hot)
            .copied()
            .filter(|&slot| slot != Self::MISSING)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Lookup tables shared by the map-free strategies
#[derive(Debug, Clone)]
pub(crate) struct DirectTables {
    pub(crate) one_hot: OneHotSlots,
    pub(crate) forest: FlatForest,
}

impl DirectTables {
    pub(crate) fn new(model: &ModelArtifact) -> Self {
        Self {
            one_hot: OneHotSlots::new(model),
            forest: FlatForest::new(&model.trees),
        }
    }

    pub(crate) fn binarize(
        &self,
        model: &ModelArtifact,
        counters: &dyn CounterCalculator,
        sample: Sample<'_>,
        rank: BorderRank,
        scratch: &mut Scratch,
    ) {
        binarize_into(
            model,
            counters,
            sample,
            |i| self.one_hot.get(i),
            rank,
            scratch,
        );
    }
}

#[derive(Debug, Clone)]
pub struct DirectHashStrategy {
    tables: DirectTables,
}

impl DirectHashStrategy {
    pub fn new(model: &ModelArtifact) -> Self {
        Self {
            tables: DirectTables::new(model),
        }
    }
}

impl ApplyStrategy for DirectHashStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectHash
    }

    fn binarize(
        &self,
        model: &ModelArtifact,
        counters: &dyn CounterCalculator,
        sample: Sample<'_>,
        scratch: &mut Scratch,
    ) {
        self.tables
            .binarize(model, counters, sample, float_bin, scratch);
    }

    fn evaluate(&self, model: &ModelArtifact, bins: &[u8]) -> f64 {
        finish(model, self.tables.forest.sum_leaves(bins))
    }

    fn uses_thread_scratch(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_one_hot_slots_resolve_packed_index() {
        let model = fixtures::diamonds_model();
        let slots = OneHotSlots::new(&model);
        assert_eq!(slots.len(), model.one_hot_features.len());
        for (i, feature) in model.one_hot_features.iter().enumerate() {
            assert_eq!(slots.get(i), model.packed_index(feature.feature_id));
        }
        assert_eq!(slots.get(slots.len()), None);
    }

    #[test]
    fn test_dangling_reference_reads_as_missing() {
        let mut model = fixtures::diamonds_model_without_counters();
        model.one_hot_features[0].feature_id = 999;
        let slots = OneHotSlots::new(&model);
        assert_eq!(slots.get(0), None);
        assert!(!slots.is_empty());
    }
}
