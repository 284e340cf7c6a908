//! Map-free strategy with 8-lane border ranking

use super::direct_hash::DirectTables;
use super::{ApplyStrategy, StrategyKind};
use crate::binarize::{float_bin_wide, Sample};
use crate::ctr::CounterCalculator;
use crate::evaluate::finish;
use crate::model::ModelArtifact;
use crate::scratch::Scratch;

#[derive(Debug, Clone)]
pub struct VectorizedStrategy {
    tables: DirectTables,
}

impl VectorizedStrategy {
    pub fn new(model: &ModelArtifact) -> Self {
        Self {
            tables: DirectTables::new(model),
        }
    }
}

impl ApplyStrategy for VectorizedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Vectorized
    }

    fn binarize(
        &self,
        model: &ModelArtifact,
        counters: &dyn CounterCalculator,
        sample: Sample<'_>,
        scratch: &mut Scratch,
    ) {
        self.tables
            .binarize(model, counters, sample, float_bin_wide, scratch);
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
    use crate::binarize::binarize;
    use crate::fixtures;

    #[test]
    fn test_bins_match_reference() {
        let model = fixtures::diamonds_model();
        let strategy = VectorizedStrategy::new(&model);
        let mut scratch = Scratch::new();

        for row in fixtures::sample_rows(32, 21) {
            let sample = Sample::split(&row, model.numeric_feature_count());
            strategy.binarize(&model, &model.counters, sample, &mut scratch);
            assert_eq!(scratch.bins(), binarize(&model, &model.counters, &row).as_slice());
        }
    }
}
