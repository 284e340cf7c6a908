//! Reference pipeline over thread-local scratch

use super::{ApplyStrategy, ScalarStrategy, StrategyKind};
use crate::binarize::Sample;
use crate::ctr::CounterCalculator;
use crate::model::ModelArtifact;
use crate::scratch::Scratch;

/// [`ScalarStrategy`] without per-call allocation
#[derive(Debug, Clone)]
pub struct PooledStrategy {
    inner: ScalarStrategy,
}

impl PooledStrategy {
    pub fn new(model: &ModelArtifact) -> Self {
        Self {
            inner: ScalarStrategy::new(model),
        }
    }
}

impl ApplyStrategy for PooledStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Pooled
    }

    fn binarize(
        &self,
        model: &ModelArtifact,
        counters: &dyn CounterCalculator,
        sample: Sample<'_>,
        scratch: &mut Scratch,
    ) {
        self.inner.binarize(model, counters, sample, scratch);
    }

    fn evaluate(&self, model: &ModelArtifact, bins: &[u8]) -> f64 {
        self.inner.evaluate(model, bins)
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
    fn test_alternating_models_share_thread_scratch() {
        let large = fixtures::diamonds_model();
        let small = fixtures::depth_two_model(1.0, 0.0);
        let pooled_large = PooledStrategy::new(&large);
        let pooled_small = PooledStrategy::new(&small);
        let reference = ScalarStrategy::new(&large);

        let small_row = [0.9, 0.1];
        for row in fixtures::sample_rows(16, 5) {
            let sample = Sample::split(&row, large.numeric_feature_count());
            let expected = reference.apply(&large, &large.counters, sample);
            assert_eq!(pooled_large.apply(&large, &large.counters, sample), expected);

            let small_sample = Sample::split(&small_row, 2);
            assert_eq!(pooled_small.apply(&small, &small.counters, small_sample), 20.0);
        }
    }
}
